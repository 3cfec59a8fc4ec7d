//! Line-based terminal input helpers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use quizline_core::models::Question;

/// Print `label` and read one trimmed line. `None` on end of input.
pub fn read_line(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask for a username, offering the last one used as default
pub fn username(default: Option<&str>) -> Result<String> {
    let label = match default {
        Some(name) => format!("Username [{}]: ", name),
        None => "Username: ".to_string(),
    };
    let entered = read_line(&label)?.unwrap_or_default();
    if entered.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(entered)
    }
}

pub fn password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

/// Map an answer typed at the prompt to an option text.
///
/// Accepts a letter (`b`), a 1-based number (`2`) or the option text.
pub fn parse_choice<'q>(question: &'q Question, input: &str) -> Option<&'q str> {
    let input = input.trim();
    let mut chars = input.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        if letter.is_ascii_alphabetic() {
            return question.option_by_letter(letter);
        }
    }
    if let Ok(number) = input.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| question.options.get(index))
            .map(String::as_str)
            .filter(|text| !text.is_empty());
    }
    question
        .options
        .iter()
        .find(|option| !option.is_empty() && option.eq_ignore_ascii_case(input))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizline_core::models::Level;

    fn question() -> Question {
        Question {
            id: 1,
            question: "Capital of France?".to_string(),
            options: vec!["Paris".into(), "Rome".into(), "Oslo".into(), "".into()],
            answer: None,
            level: Level::BEGINNER,
        }
    }

    #[test]
    fn test_parse_choice_letter() {
        let q = question();
        assert_eq!(parse_choice(&q, "a"), Some("Paris"));
        assert_eq!(parse_choice(&q, " C "), Some("Oslo"));
        assert_eq!(parse_choice(&q, "d"), None);
    }

    #[test]
    fn test_parse_choice_number() {
        let q = question();
        assert_eq!(parse_choice(&q, "2"), Some("Rome"));
        assert_eq!(parse_choice(&q, "0"), None);
        assert_eq!(parse_choice(&q, "4"), None);
        assert_eq!(parse_choice(&q, "9"), None);
    }

    #[test]
    fn test_parse_choice_text() {
        let q = question();
        assert_eq!(parse_choice(&q, "rome"), Some("Rome"));
        assert_eq!(parse_choice(&q, "Berlin"), None);
        assert_eq!(parse_choice(&q, ""), None);
    }
}
