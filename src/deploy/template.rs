//! Minimal configuration template rendering.
//!
//! Supports `{{field}}` substitution and `{{#if field}}` /
//! `{{#unless field}}` conditional sections over a JSON object. Pure and
//! stateless: no caching, and identical inputs always produce identical
//! output. Unknown fields and malformed directives are errors, never
//! silently defaulted.

use serde_json::{Map, Value};

use crate::error::KuskError;

/// Render `template` against `data`, which must be a JSON object.
pub fn render(template: &str, data: &Value) -> Result<String, KuskError> {
    let object = data
        .as_object()
        .ok_or_else(|| KuskError::TemplateRender("template data must be an object".to_string()))?;
    render_section(template, object)
}

fn render_section(input: &str, data: &Map<String, Value>) -> Result<String, KuskError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let close = after_open.find("}}").ok_or_else(|| {
            KuskError::TemplateParse("unterminated '{{' directive".to_string())
        })?;
        let tag = after_open[..close].trim();
        let after_tag = &after_open[close + 2..];

        if let Some(field) = tag.strip_prefix("#if ") {
            let (body, remainder) = split_block(after_tag, "if")?;
            if truthy(field.trim(), data)? {
                output.push_str(&render_section(body, data)?);
            }
            rest = remainder;
        } else if let Some(field) = tag.strip_prefix("#unless ") {
            let (body, remainder) = split_block(after_tag, "unless")?;
            if !truthy(field.trim(), data)? {
                output.push_str(&render_section(body, data)?);
            }
            rest = remainder;
        } else if tag.starts_with('/') {
            return Err(KuskError::TemplateParse(format!(
                "closing tag '{{{{{}}}}}' without a matching block",
                tag
            )));
        } else if tag.starts_with('#') {
            return Err(KuskError::TemplateParse(format!(
                "unknown directive '{{{{{}}}}}'",
                tag
            )));
        } else {
            output.push_str(&substitute(tag, data)?);
            rest = after_tag;
        }
    }

    output.push_str(rest);
    Ok(output)
}

/// Split `input` into the body of a block opened with `kind` and whatever
/// follows the matching closing tag, honoring nested blocks.
fn split_block<'a>(input: &'a str, kind: &str) -> Result<(&'a str, &'a str), KuskError> {
    let mut depth = 1usize;
    let mut search_from = 0usize;

    while let Some(offset) = input[search_from..].find("{{") {
        let open = search_from + offset;
        let after_open = &input[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        let tag = after_open[..close].trim();
        let tag_end = open + 2 + close + 2;

        if tag.starts_with("#if ") || tag.starts_with("#unless ") {
            depth += 1;
        } else if tag == "/if" || tag == "/unless" {
            depth -= 1;
            if depth == 0 {
                if tag != format!("/{}", kind) {
                    return Err(KuskError::TemplateParse(format!(
                        "block '#{}' closed by '{}'",
                        kind, tag
                    )));
                }
                return Ok((&input[..open], &input[tag_end..]));
            }
        }
        search_from = tag_end;
    }

    Err(KuskError::TemplateParse(format!(
        "block '#{}' is never closed",
        kind
    )))
}

fn lookup<'a>(field: &str, data: &'a Map<String, Value>) -> Result<&'a Value, KuskError> {
    data.get(field)
        .ok_or_else(|| KuskError::TemplateRender(format!("unknown field '{}'", field)))
}

fn truthy(field: &str, data: &Map<String, Value>) -> Result<bool, KuskError> {
    Ok(match lookup(field, data)? {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn substitute(field: &str, data: &Map<String, Value>) -> Result<String, KuskError> {
    Ok(match lookup(field, data)? {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(KuskError::TemplateRender(format!(
                "field '{}' is not renderable: {}",
                field, other
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitution() {
        let data = json!({"pause_image": "registry/pause:3.1"});
        let rendered = render("pause_image = \"{{pause_image}}\"", &data).unwrap();
        assert_eq!(rendered, "pause_image = \"registry/pause:3.1\"");
    }

    #[test]
    fn test_render_if_block() {
        let data = json!({"verbose": true});
        assert_eq!(
            render("a{{#if verbose}}b{{/if}}c", &data).unwrap(),
            "abc"
        );
        let data = json!({"verbose": false});
        assert_eq!(render("a{{#if verbose}}b{{/if}}c", &data).unwrap(), "ac");
    }

    #[test]
    fn test_render_unless_block() {
        let data = json!({"strict": false});
        assert_eq!(
            render("{{#unless strict}}capabilities{{/unless}}", &data).unwrap(),
            "capabilities"
        );
        let data = json!({"strict": true});
        assert_eq!(
            render("{{#unless strict}}capabilities{{/unless}}", &data).unwrap(),
            ""
        );
    }

    #[test]
    fn test_render_nested_blocks() {
        let data = json!({"outer": true, "inner": false});
        let rendered = render(
            "{{#if outer}}x{{#unless inner}}y{{/unless}}z{{/if}}",
            &data,
        )
        .unwrap();
        assert_eq!(rendered, "xyz");
    }

    #[test]
    fn test_render_unknown_field_is_error() {
        let data = json!({});
        let err = render("{{missing}}", &data).unwrap_err();
        assert!(matches!(err, KuskError::TemplateRender(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_render_unknown_field_in_condition_is_error() {
        let data = json!({});
        assert!(render("{{#if missing}}x{{/if}}", &data).is_err());
    }

    #[test]
    fn test_render_unterminated_directive_is_error() {
        let data = json!({"a": "b"});
        let err = render("{{a", &data).unwrap_err();
        assert!(matches!(err, KuskError::TemplateParse(_)));
    }

    #[test]
    fn test_render_unclosed_block_is_error() {
        let data = json!({"a": true});
        let err = render("{{#if a}}body", &data).unwrap_err();
        assert!(matches!(err, KuskError::TemplateParse(_)));
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_render_mismatched_close_is_error() {
        let data = json!({"a": true});
        let err = render("{{#if a}}body{{/unless}}", &data).unwrap_err();
        assert!(matches!(err, KuskError::TemplateParse(_)));
    }

    #[test]
    fn test_render_stray_close_is_error() {
        let data = json!({});
        assert!(render("{{/if}}", &data).unwrap_err().to_string().contains("without a matching block"));
    }

    #[test]
    fn test_render_unknown_directive_is_error() {
        let data = json!({});
        assert!(render("{{#each items}}x{{/each}}", &data).is_err());
    }

    #[test]
    fn test_render_non_object_data_is_error() {
        assert!(render("text", &json!( ["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_render_deterministic() {
        let data = json!({"strict": false, "image": "registry/pause:3.1"});
        let template = "{{#unless strict}}caps\n{{/unless}}image = {{image}}\n";
        let first = render(template, &data).unwrap();
        let second = render(template, &data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_number_and_bool_substitution() {
        let data = json!({"port": 22, "enabled": true});
        assert_eq!(
            render("{{port}}/{{enabled}}", &data).unwrap(),
            "22/true"
        );
    }
}
