//! Prompt text for each pipeline stage.

use crate::models::GenerationConfig;

/// Drop parts that would make the subject explode into itself.
///
/// A part is dropped when it is blank, equals the whole subject name, or
/// equals one of the subject's words (case-insensitive). "Engine" is not a
/// component of "Car Engine"; "Engine Block" still is.
pub fn filter_parts(subject: &str, part_names: &[String]) -> Vec<String> {
    let subject_lower = subject.trim().to_lowercase();
    let tokens: Vec<&str> = subject_lower.split_whitespace().collect();

    part_names
        .iter()
        .map(|p| p.trim())
        .filter(|p| {
            let lower = p.to_lowercase();
            !lower.is_empty() && lower != subject_lower && !tokens.contains(&lower.as_str())
        })
        .map(str::to_string)
        .collect()
}

pub fn identify_prompt() -> &'static str {
    "Identify the single main object in this image. \
     Respond with only its common name, two to four words, no punctuation."
}

pub fn analysis_prompt(query: &str, config: &GenerationConfig) -> String {
    let mut prompt = format!(
        r#"Analyze "{}" as a physical object that can be taken apart.

Respond ONLY with JSON of this shape:
{{
  "name": "canonical name of the object",
  "category": "short category label",
  "description": "one or two sentences",
  "partNames": ["5 to 7 major components, each a distinct physical part"],
  "facts": ["3 to 5 short interesting facts"],
  "characteristics": [{{"label": "property", "value": "value"}}]
}}

Give 3 to 6 characteristics. Never list the object itself as one of its parts."#,
        query
    );
    if let Some(detail) = &config.detail {
        prompt.push_str(&format!("\nLevel of detail: {}.", detail));
    }
    prompt
}

fn visual_options(config: &GenerationConfig) -> String {
    let mut options = String::new();
    if let Some(style) = &config.style {
        options.push_str(&format!(" Style: {}.", style));
    }
    if let Some(perspective) = &config.perspective {
        options.push_str(&format!(" Perspective: {}.", perspective));
    }
    if let Some(detail) = &config.detail {
        options.push_str(&format!(" Detail: {}.", detail));
    }
    options
}

pub fn assembled_prompt(subject: &str, config: &GenerationConfig) -> String {
    format!(
        "A clean technical illustration of a complete, assembled {} on a plain white background.{}",
        subject,
        visual_options(config)
    )
}

pub fn cutaway_prompt(subject: &str, part_names: &[String], config: &GenerationConfig) -> String {
    format!(
        "A cutaway view of the {} from the reference image, with a section removed to reveal \
         its internal components: {}. Keep the same object, angle and lighting.{}",
        subject,
        part_names.join(", "),
        visual_options(config)
    )
}

pub fn exploded_prompt(subject: &str, part_names: &[String], config: &GenerationConfig) -> String {
    format!(
        "An exploded-view technical illustration of a {}, with these components separated \
         along clear axes and spaced apart so each is fully visible: {}. Plain white \
         background, no labels or text.{}",
        subject,
        part_names.join(", "),
        visual_options(config)
    )
}

pub fn coordinates_prompt(part_names: &[String]) -> String {
    format!(
        r#"This is an exploded-view illustration. Locate the center of each of these parts: {}.

Respond ONLY with a JSON array:
[{{"name": "part name exactly as given", "description": "what it looks like, one short sentence", "x": 0-100, "y": 0-100}}]

x and y are percentages of the image width and height measured from the top-left corner.
Omit parts you cannot see."#,
        part_names.join(", ")
    )
}
