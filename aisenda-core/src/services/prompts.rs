//! Prompt templates for the assistant features

pub const VIDEO_SYSTEM: &str =
    "You are a senior short-video content strategist specialising in aesthetic medicine.";

pub const QA_SYSTEM: &str =
    "You are a senior aesthetic-medicine consultant known for emotionally intelligent client communication.";

pub fn facial_analysis(requirement: &str, analysis_type: &str) -> String {
    format!(
        "As a professional aesthetic-medicine doctor, analyse these facial photos.\n\
         Requirement: {requirement}\n\
         Analysis depth: {analysis_type}\n\
         \n\
         Cover the following:\n\
         1. Facial proportions (three courts, five eyes): bone structure assessment\n\
         2. Skin condition: texture and fat distribution\n\
         3. Aesthetic focus: three areas with the most room for improvement\n\
         4. Plan: product strategy, budget guidance and consultation talking points\n\
         \n\
         Use professional aesthetic-medicine language and give detailed analysis and advice."
    )
}

pub fn content(keywords: &str, persona: &str, style: &str) -> String {
    format!(
        "Write 3 different social-media posts from the following brief.\n\
         \n\
         Keywords: {keywords}\n\
         Persona: {persona}\n\
         Style: {style}\n\
         \n\
         Requirements:\n\
         1. Each post has a distinct voice\n\
         2. Fits the aesthetic-medicine industry\n\
         3. Engaging and persuasive\n\
         4. 100 to 200 characters each\n\
         5. Emoji are welcome\n\
         \n\
         Return the 3 complete posts separated by ---."
    )
}

pub fn video_create(platform: &str, topic: &str, style: &str) -> String {
    format!(
        "{VIDEO_SYSTEM}\n\n\
         Write an aesthetic-medicine video script for {platform}.\n\
         \n\
         Topic: {topic}\n\
         Style: {style}\n\
         \n\
         Requirements:\n\
         1. A hook in the first 3 seconds\n\
         2. Practical content with a talking point in the middle\n\
         3. A call to interact at the end\n\
         4. 60 to 90 seconds in total\n\
         5. Short-video pacing\n\
         6. Shot suggestions and music recommendations\n\
         \n\
         Answer in markdown with every detail."
    )
}

pub fn video_rewrite(platform: &str, original_script: &str, optimization_needs: &str) -> String {
    format!(
        "{VIDEO_SYSTEM}\n\n\
         Improve the following video script.\n\
         \n\
         Original script:\n\
         {original_script}\n\
         \n\
         What to improve: {optimization_needs}\n\
         \n\
         Target platform: {platform}\n\
         \n\
         Requirements:\n\
         1. Keep the core content\n\
         2. Apply the requested improvements\n\
         3. Add a talking point or more expertise\n\
         4. Tighten the opening and the ending\n\
         5. Short-video pacing\n\
         \n\
         Answer with the improved script in markdown."
    )
}

pub fn qa(question: &str, scenario: &str, style: &str) -> String {
    format!(
        "{QA_SYSTEM}\n\n\
         Write 5 replies in different styles to this client question.\n\
         \n\
         Client question: {question}\n\
         Scenario: {scenario}\n\
         Preferred tone: {style}\n\
         \n\
         The 5 styles:\n\
         1. Authoritative: persuade with data and cases\n\
         2. Caring: empathy plus professional advice\n\
         3. Emotionally intelligent: understand first, then guide\n\
         4. Reassuring: remove doubts and rebuild trust\n\
         5. Direct: solve the problem quickly\n\
         \n\
         Each reply should fit the aesthetic-medicine industry, be persuasive and \
         empathetic, run 100 to 150 characters and invite further consultation.\n\
         \n\
         Format each reply as\n\
         Style: content\n\
         ---"
    )
}

pub fn comparison_image(adjustment_suggestions: &str) -> String {
    format!(
        "Edit this facial photo precisely and produce the improved result described below.\n\
         \n\
         Adjustments:\n\
         {adjustment_suggestions}\n\
         \n\
         Requirements:\n\
         1. Edit the original photo; do not generate a new one\n\
         2. Only change the listed areas and leave everything else untouched\n\
         3. Keep lighting, angle and proportions consistent\n\
         4. The result must look natural\n\
         5. Output format: ![image](data:image/jpeg;base64,...)"
    )
}
