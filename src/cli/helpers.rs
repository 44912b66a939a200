//! CLI helper functions.

/// Parse a single CSV line with basic quoting support.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if !in_quotes && current.is_empty() => {
                in_quotes = true;
            }
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // Escaped quote
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current = String::new();
            }
            _ => {
                current.push(ch);
            }
        }
    }
    fields.push(current.trim().to_string());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_line_simple() {
        assert_eq!(
            parse_csv_line("Validic,Ada,Lovelace,ada@validic.example,CEO,true"),
            vec!["Validic", "Ada", "Lovelace", "ada@validic.example", "CEO", "true"]
        );
    }

    #[test]
    fn test_parse_csv_line_quoted() {
        assert_eq!(
            parse_csv_line(r#""Equity Shift, Inc.",Bob,,bob@es.example,,false"#),
            vec!["Equity Shift, Inc.", "Bob", "", "bob@es.example", "", "false"]
        );
    }

    #[test]
    fn test_parse_csv_line_escaped_quote() {
        assert_eq!(parse_csv_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }
}
