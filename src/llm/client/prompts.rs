//! Default LLM prompts for OCR and distortion analysis.
//!
//! Analysis templates use `{distortions}`, `{format_instructions}`,
//! `{question}` and (contextual only) `{context}` placeholders.

/// Default instruction sent with every column image.
pub const DEFAULT_OCR_PROMPT: &str = "Perform Optical Character Recognition (OCR) on the following image. The output should be the extracted text";

/// Prompt for analysing an issue on its own.
pub const CONTEXT_FREE_PROMPT: &str = r#"
You are a Cognitive Behavioral Therapist. You are assisting me with helping to identify negative thinking patterns or cognitive distortions that usually prevent me from seeing situations as they really are.

The following is a JSON object containing common cognitive distortions and their descriptions as well as questions to help challenge the cognitive distortions:

{distortions}

Your task is to:

1. From the list of common cognitive distortions in the json object above, identify the cognitive distortions present in my issue, providing an explanation of how each cognitive distortion relates to my issue.

2. Based on each cognitive distortion identified, help me challenge the cognitive distortions by asking the questions from each category provided above. Adjust the questions to be relevant to my issue.

Issue: {question}

Your response should be directed in second person format, directed at me.

{format_instructions}
"#;

/// Prompt for analysing retrieved journal context alongside an issue.
pub const CONTEXTUAL_PROMPT: &str = r#"
Issue: {question}

You are a Cognitive Behavioral Therapist. You are assisting me with helping to identify negative thinking patterns or cognitive distortions that usually prevent me from seeing situations as they really are.

The following is a JSON object containing common cognitive distortions and their descriptions:

{distortions}

The context below are some of my past journal entries. I would like to get a sense of distortions that are present in the context.

Your task is to:

1. From the list of common cognitive distortions in the json object above identify those that are present in the context, providing an explanation of how the cognitive distortion relates to the context.

2. Identify situations or events that are similar between the context and the issue that seem to trigger these cognitive distortions as well as overall themes. Do not provide advice, simply state similarities between the context and the issue.

Context: {context}

Your response should all be directed in second person format, directed at me.

{format_instructions}
"#;

/// Wrapper around a JSON schema telling the model to emit one JSON instance.
pub const FORMAT_INSTRUCTIONS: &str = r#"The output should be formatted as a JSON instance that conforms to the JSON schema below.

As an example, for the schema {"properties": {"foo": {"title": "Foo", "description": "a list of strings", "type": "array", "items": {"type": "string"}}}, "required": ["foo"]}
the object {"foo": ["bar", "baz"]} is a well-formatted instance of the schema. The object {"properties": {"foo": ["bar", "baz"]}} is not well-formatted.

Here is the output schema:
```
{schema}
```

Respond with the JSON instance only, with no commentary before or after it."#;

/// Fill `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing
/// `{context}` cannot pull in other values. Unknown placeholders are left as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replaced = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });

        match replaced {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_known_placeholders() {
        let out = fill("Issue: {question}\nContext: {context}", &[("question", "q"), ("context", "c")]);
        assert_eq!(out, "Issue: q\nContext: c");
    }

    #[test]
    fn test_fill_does_not_rescan_values() {
        let out = fill("{question} / {context}", &[("question", "{context}"), ("context", "journal")]);
        assert_eq!(out, "{context} / journal");
    }

    #[test]
    fn test_fill_keeps_json_braces() {
        let out = fill(r#"{"a": {"b": 1}} {question}"#, &[("question", "q")]);
        assert_eq!(out, r#"{"a": {"b": 1}} q"#);
    }

    #[test]
    fn test_templates_have_placeholders() {
        for template in [CONTEXT_FREE_PROMPT, CONTEXTUAL_PROMPT] {
            assert!(template.contains("{distortions}"));
            assert!(template.contains("{question}"));
            assert!(template.contains("{format_instructions}"));
        }
        assert!(CONTEXTUAL_PROMPT.contains("{context}"));
        assert!(!CONTEXT_FREE_PROMPT.contains("{context}"));
        assert!(FORMAT_INSTRUCTIONS.contains("{schema}"));
    }
}
