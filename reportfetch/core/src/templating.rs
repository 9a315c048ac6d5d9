//! Placeholder substitution in query text
//!
//! Query text may reference macro parameters with `{name}` where `name` consists of ASCII letters,
//! digits and underscores. Literal braces are written as `{{` and `}}`. Substitution happens in two
//! phases: [`QueryTemplate::parse`] splits the text into [`Segment`]s and
//! [`QueryTemplate::render`] resolves every placeholder against a set of [`MacroParams`].
//!
//! Macro values can be relative dates, see [`resolve_dynamic_params`].

use chrono::{Datelike, Days, Months, NaiveDate};
use miette::Diagnostic;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::model::MacroParams;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Diagnostic)]
pub enum TemplateError {
    #[error("Unbalanced '{brace}' at byte {position}")]
    #[diagnostic(
        code(reportfetch::template::malformed),
        help("Placeholders are written as {{name}}, use '{{{{' and '}}}}' for literal braces")
    )]
    Malformed { brace: char, position: usize },

    #[error("Missing macro parameters: {0:?}")]
    #[diagnostic(
        code(reportfetch::template::missing_params),
        help(
            "Provide the missing parameters using the -m flag or the 'macro' section of the config file.\n\
             \n\
             Example:\n\
             reportfetch queries/*.sql -m start_date=2024-01-01 -m end_date=:YYYYMMDD"
        )
    )]
    MissingParams(BTreeSet<String>),

    #[error("Invalid dynamic value '{value}' for macro '{name}'")]
    #[diagnostic(
        code(reportfetch::template::dynamic_value),
        help("Dynamic dates are written as :YYYYMMDD, :YYYYMM or :YYYY with an optional offset such as :YYYYMMDD-7")
    )]
    InvalidDynamicValue { name: String, value: String },
}

/// A piece of query text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Query text split into literals and placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    segments: Vec<Segment>,
}

impl QueryTemplate {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = TOKEN_REGEX.get_or_init(|| {
            Regex::new(r"\{\{|\}\}|\{([A-Za-z0-9_]+)\}|[{}]").expect("invalid regex")
        });

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for capture in regex.captures_iter(text) {
            let Some(token) = capture.get(0) else {
                continue;
            };
            literal.push_str(&text[last..token.start()]);
            last = token.end();

            match (token.as_str(), capture.get(1)) {
                ("{{", _) => literal.push('{'),
                ("}}", _) => literal.push('}'),
                (_, Some(name)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.as_str().to_string()));
                }
                (brace, None) => {
                    return Err(TemplateError::Malformed {
                        brace: brace.chars().next().unwrap_or('{'),
                        position: token.start(),
                    })
                }
            }
        }

        literal.push_str(&text[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all referenced parameters
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Resolve every placeholder, all unresolved names are reported at once
    pub fn render(&self, params: &MacroParams) -> Result<String, TemplateError> {
        let missing = self
            .placeholders()
            .into_iter()
            .filter(|name| params.get(name).is_none())
            .map(str::to_string)
            .collect::<BTreeSet<String>>();

        if !missing.is_empty() {
            return Err(TemplateError::MissingParams(missing));
        }

        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => rendered.push_str(params.get(name).unwrap_or_default()),
            }
        }

        Ok(rendered)
    }
}

/// Replace relative date values with concrete dates as seen from `today`
///
/// - `:YYYYMMDD-N` the date N days ago
/// - `:YYYYMM-N` the first day of the month N months ago
/// - `:YYYY-N` the first day of the year N years ago
///
/// The offset is optional. All dates are formatted as `YYYY-MM-DD`, other values are kept as is
pub fn resolve_dynamic_params(
    params: &MacroParams,
    today: NaiveDate,
) -> Result<MacroParams, TemplateError> {
    params
        .iter()
        .map(|(name, value)| {
            let resolved = resolve_dynamic_value(value, today).ok_or_else(|| {
                TemplateError::InvalidDynamicValue {
                    name: name.to_string(),
                    value: value.to_string(),
                }
            })?;
            Ok((name.to_string(), resolved))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(MacroParams::from_iter)
}

fn resolve_dynamic_value(value: &str, today: NaiveDate) -> Option<String> {
    static DYNAMIC_REGEX: OnceLock<Regex> = OnceLock::new();

    if !value.starts_with(":YYYY") {
        return Some(value.to_string());
    }

    let captures = DYNAMIC_REGEX
        .get_or_init(|| Regex::new(r"^:(YYYYMMDD|YYYYMM|YYYY)(?:-(\d+))?$").expect("invalid regex"))
        .captures(value)?;

    let offset = match captures.get(2) {
        Some(n) => n.as_str().parse::<u32>().ok()?,
        None => 0,
    };

    let date = match captures.get(1)?.as_str() {
        "YYYYMMDD" => today.checked_sub_days(Days::new(offset.into()))?,
        "YYYYMM" => today
            .checked_sub_months(Months::new(offset))?
            .with_day(1)?,
        _ => NaiveDate::from_ymd_opt(today.year().checked_sub(offset.try_into().ok()?)?, 1, 1)?,
    };

    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(pairs: &[(&str, &str)]) -> MacroParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_parse_splits_segments() {
        let template =
            QueryTemplate::parse("SELECT campaign.id FROM campaign WHERE segments.date > '{start}'")
                .unwrap();

        assert_eq!(
            template.segments(),
            &[
                Segment::Literal(
                    "SELECT campaign.id FROM campaign WHERE segments.date > '".into()
                ),
                Segment::Placeholder("start".into()),
                Segment::Literal("'".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let template = QueryTemplate::parse("SELECT '{{not_a_macro}}' AS x").unwrap();

        assert!(template.placeholders().is_empty());
        assert_eq!(
            template.render(&MacroParams::default()).unwrap(),
            "SELECT '{not_a_macro}' AS x"
        );
    }

    #[rstest]
    #[case("SELECT { FROM campaign", '{', 7)]
    #[case("SELECT } FROM campaign", '}', 7)]
    #[case("SELECT {a-b} FROM campaign", '{', 7)]
    fn test_malformed_braces(#[case] text: &str, #[case] brace: char, #[case] position: usize) {
        assert_eq!(
            QueryTemplate::parse(text).unwrap_err(),
            TemplateError::Malformed { brace, position }
        );
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let template = QueryTemplate::parse("{a} AND {b} AND {a}").unwrap();
        let rendered = template.render(&params(&[("a", "1"), ("b", "2")])).unwrap();

        assert_eq!(rendered, "1 AND 2 AND 1");
    }

    #[test]
    fn test_render_reports_all_missing_params() {
        let template = QueryTemplate::parse("{start} {end} {known}").unwrap();
        let err = template.render(&params(&[("known", "x")])).unwrap_err();

        assert_eq!(
            err,
            TemplateError::MissingParams(BTreeSet::from(["end".into(), "start".into()]))
        );
    }

    #[rstest]
    #[case(":YYYYMMDD", "2024-03-15")]
    #[case(":YYYYMMDD-15", "2024-02-29")]
    #[case(":YYYYMM", "2024-03-01")]
    #[case(":YYYYMM-3", "2023-12-01")]
    #[case(":YYYY-1", "2023-01-01")]
    #[case("2020-01-01", "2020-01-01")]
    #[case(":literal", ":literal")]
    fn test_dynamic_values(#[case] value: &str, #[case] expected: &str) {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let resolved = resolve_dynamic_params(&params(&[("d", value)]), today).unwrap();

        assert_eq!(resolved.get("d"), Some(expected));
    }

    #[rstest]
    #[case(":YYYYMMDD-")]
    #[case(":YYYYMMDD+1")]
    #[case(":YYYYMMDDD")]
    fn test_malformed_dynamic_values(#[case] value: &str) {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let err = resolve_dynamic_params(&params(&[("d", value)]), today).unwrap_err();

        assert!(matches!(err, TemplateError::InvalidDynamicValue { .. }));
    }
}
