use regex::Regex;

// Quick-add tokens recognised inside the title input: `!3` sets priority,
// `#word` adds a label, `@word` sets the project. Tokens are stripped from
// the title and leftover whitespace is collapsed.
#[derive(Debug, PartialEq)]
pub struct ParsedTitle {
    pub title: String,
    pub priority: Option<u8>,
    pub labels: Vec<String>,
    pub project: Option<String>,
}

pub fn parse_title_input(input: &str) -> ParsedTitle {
    let priority_re = Regex::new(r"!(\d+)\s*").unwrap();
    let label_re = Regex::new(r"#([\w-]+)\s*").unwrap();
    let project_re = Regex::new(r"@([\w-]+)\s*").unwrap();

    let mut priority = None;
    for caps in priority_re.captures_iter(input) {
        if let Some(priority_match) = caps.get(1) {
            if let Ok(p) = priority_match.as_str().parse::<u8>() {
                if (1..=5).contains(&p) && priority.is_none() {
                    priority = Some(p);
                }
            }
        }
    }

    let mut labels = Vec::new();
    for caps in label_re.captures_iter(input) {
        if let Some(label) = caps.get(1) {
            let label = label.as_str().to_string();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }

    let mut project = None;
    for caps in project_re.captures_iter(input) {
        if let Some(name) = caps.get(1) {
            if project.is_none() {
                project = Some(name.as_str().to_string());
            }
        }
    }

    let title = priority_re.replace_all(input, "").to_string();
    let title = label_re.replace_all(&title, "").to_string();
    let title = project_re.replace_all(&title, "").to_string();

    let title = Regex::new(r"\s+")
        .unwrap()
        .replace_all(&title, " ")
        .trim()
        .to_string();

    ParsedTitle {
        title,
        priority,
        labels,
        project,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_priority_in_middle() {
        let input = "Update !4 software documentation";
        let expected = ParsedTitle {
            title: "Update software documentation".to_string(),
            priority: Some(4),
            labels: vec![],
            project: None,
        };
        let result = parse_title_input(input);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_parse_with_labels_and_project() {
        let input = "Fix login bug #backend #urgent @webapp";
        let expected = ParsedTitle {
            title: "Fix login bug".to_string(),
            priority: None,
            labels: vec!["backend".to_string(), "urgent".to_string()],
            project: Some("webapp".to_string()),
        };
        let result = parse_title_input(input);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_parse_with_everything_and_extra_spaces() {
        let input = "  Deploy to production   !5  #ops  @infra ";
        let expected = ParsedTitle {
            title: "Deploy to production".to_string(),
            priority: Some(5),
            labels: vec!["ops".to_string()],
            project: Some("infra".to_string()),
        };
        let result = parse_title_input(input);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_parse_with_multiple_priorities_keeps_first_valid() {
        let input = "  !1  !2 Organize    team building !3 event ";
        let expected = ParsedTitle {
            title: "Organize team building event".to_string(),
            priority: Some(1),
            labels: vec![],
            project: None,
        };
        let result = parse_title_input(input);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_parse_with_invalid_priority() {
        let input = "Check logs !8    immediately";
        let expected = ParsedTitle {
            title: "Check logs immediately".to_string(),
            priority: None,
            labels: vec![],
            project: None,
        };
        let result = parse_title_input(input);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_parse_duplicate_labels_collapse() {
        let input = "Water plants #home #home";
        let result = parse_title_input(input);
        assert_eq!(result.labels, vec!["home".to_string()]);
        assert_eq!(result.title, "Water plants");
    }

    #[test]
    fn test_parse_plain_title_untouched() {
        let input = "Write report";
        let result = parse_title_input(input);
        assert_eq!(result.title, "Write report");
        assert_eq!(result.priority, None);
        assert!(result.labels.is_empty());
        assert_eq!(result.project, None);
    }
}
