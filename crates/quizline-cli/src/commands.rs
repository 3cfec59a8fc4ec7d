//! Command handlers.

use anyhow::{anyhow, bail, Result};
use tracing::{info, warn};

use quizline_core::cache::CachedData;
use quizline_core::models::{Level, QuizAttempt, PASS_THRESHOLD_PERCENT};
use quizline_core::quiz::{LevelEditor, QuizRun, Step};
use quizline_core::utils::{format_percentage, progress_bar, truncate_string};

use crate::app::App;
use crate::prompt;

/// Width of the progress bars in `progress`
const PROGRESS_BAR_WIDTH: usize = 20;

/// Maximum question text shown in listings
const LISTING_TEXT_WIDTH: usize = 60;

/// How attempt timestamps are shown
const ATTEMPT_DATE_FORMAT: &str = "%d %b %Y %H:%M";

pub async fn login(app: &mut App, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => prompt::username(app.config.last_username.as_deref())?,
    };
    let password = prompt::password("Password: ")?;

    app.client.login(&username, &password).await?;
    app.remember_user(&username);
    println!("Logged in as {}.", username);
    Ok(())
}

pub async fn register(app: &App, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(name) => name,
        None => prompt::username(None)?,
    };
    let password = prompt::password("Password (at least 6 characters): ")?;
    let confirm = prompt::password("Repeat password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let message = app.client.register(&username, &password).await?;
    println!("{}. You can now run `quizline login`.", message);
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    app.logout()?;
    println!("Logged out.");
    Ok(())
}

pub fn status(app: &App) -> Result<()> {
    println!("Server:  {}", app.client.base_url());
    println!("Tokens:  {:?}", app.config.token_backend);
    if !app.is_logged_in() {
        println!("Session: not logged in");
        return Ok(());
    }
    match app.session_summary() {
        Some(summary) => println!("Session: {}", summary),
        None => println!("Session: logged in"),
    }
    Ok(())
}

/// Play the current level interactively and submit the answers
pub async fn play(app: &App) -> Result<()> {
    let set = app.client.questions().await?;
    if set.questions.is_empty() {
        println!("{}", set.empty_message());
        return Ok(());
    }

    println!("{} of {}", set.current_level, set.total_levels);
    if let Some(ref info) = set.level_info {
        println!(
            "Best score {}/{} ({}) over {} attempt(s){}",
            info.best_score,
            info.total_questions,
            format_percentage(info.percentage),
            info.attempts,
            if info.passed { ", passed" } else { "" }
        );
    }

    let mut run = QuizRun::new(set.questions);
    let answers = loop {
        let Some(question) = run.current().cloned() else {
            bail!("Quiz has no current question");
        };
        println!();
        println!("Question {} of {}: {}", run.position(), run.len(), question.question);
        for (letter, text) in question.lettered_options() {
            println!("  {}) {}", letter, text);
        }

        let Some(input) = prompt::read_line("Your answer: ")? else {
            println!();
            println!("Quiz abandoned, nothing was submitted.");
            return Ok(());
        };
        match prompt::parse_choice(&question, &input) {
            Some(choice) => {
                run.select(choice);
            }
            None => {
                println!("Pick one of the listed options.");
                continue;
            }
        }

        match run.advance() {
            Step::Finished(answers) => break answers,
            Step::Next => {}
            Step::NothingSelected => println!("Pick one of the listed options."),
        }
    };

    let result = app.client.submit(&answers).await?;
    info!(score = result.score, total = result.total_questions, "Quiz submitted");

    println!();
    println!(
        "Score: {}/{} ({})",
        result.score,
        result.total_questions,
        format_percentage(result.percentage)
    );
    for question in run.questions() {
        let chosen = answers.get(&question.id).map(String::as_str).unwrap_or("");
        match result.correct_answer(question.id) {
            Some(correct) if correct != chosen => {
                println!(
                    "  ✗ {} - you chose {:?}, correct was {:?}",
                    truncate_string(&question.question, LISTING_TEXT_WIDTH),
                    chosen,
                    correct
                );
            }
            _ => {}
        }
    }

    if run.is_perfect(&result) {
        println!("Perfect score!");
    }
    if result.level_passed {
        match result.current_level.and_then(Level::next) {
            Some(next) if result.next_level_unlocked => println!("Level passed! {} unlocked.", next),
            _ => println!("Level passed!"),
        }
    } else if !Level::is_passing(result.percentage) {
        println!(
            "Score at least {} to pass this level.",
            format_percentage(PASS_THRESHOLD_PERCENT)
        );
    }
    Ok(())
}

pub async fn history(app: &App, details: bool) -> Result<()> {
    let history = match app.client.history().await {
        Ok(history) => {
            if let Err(e) = app.cache.save_history(&history) {
                warn!(error = %e, "Failed to cache history");
            }
            history
        }
        Err(e) if e.is_network() => {
            let cached = app
                .cache
                .load_history()?
                .ok_or_else(|| anyhow!(e))?;
            println!("{}", offline_notice("history", &cached));
            cached.data
        }
        Err(e) => return Err(e.into()),
    };

    if history.is_empty() {
        println!("No quizzes taken yet.");
        return Ok(());
    }
    for attempt in &history {
        print_attempt(attempt, details);
    }
    Ok(())
}

/// Banner shown when a command falls back to cached data
fn offline_notice<T>(what: &str, cached: &CachedData<T>) -> String {
    let mut notice = format!("Offline - showing {} cached {}.", what, cached.age_display());
    if cached.is_stale() {
        notice.push_str(" This copy may be out of date.");
    }
    notice
}

fn print_attempt(attempt: &QuizAttempt, details: bool) {
    let when = attempt
        .submitted_at()
        .map(|at| at.format(ATTEMPT_DATE_FORMAT).to_string())
        .unwrap_or_else(|| attempt.submitted_at.clone());
    println!(
        "#{:<5} {}  level {}  {}/{} ({}, {}){}",
        attempt.quiz_id,
        when,
        attempt.level.value(),
        attempt.score,
        attempt.total_questions,
        format_percentage(attempt.percentage),
        attempt.score_class().label(),
        if attempt.level_passed { "  passed" } else { "" }
    );
    if !details {
        return;
    }
    let mut wrong = attempt.wrong_answers().peekable();
    if wrong.peek().is_none() {
        println!("    all answers correct");
        return;
    }
    for answer in wrong {
        println!(
            "    ✗ {}",
            truncate_string(&answer.question_text, LISTING_TEXT_WIDTH)
        );
        println!(
            "        chose {:?}, correct {:?}",
            answer.selected_option.as_deref().unwrap_or(""),
            answer.correct_answer
        );
    }
}

pub async fn progress(app: &App) -> Result<()> {
    let progress = app.client.user_progress().await?;
    println!("Current level: {}", progress.current_level);
    println!("Highest unlocked: {}", progress.highest_unlocked());
    for (level, p) in progress.levels() {
        let state = if p.passed {
            "passed"
        } else if p.unlocked {
            "unlocked"
        } else {
            "locked"
        };
        println!(
            "{:<13} {} {:>6}  best {}/{}  {} attempt(s)  {}",
            level.name(),
            progress_bar(p.percentage, PROGRESS_BAR_WIDTH),
            format_percentage(p.percentage),
            p.best_score,
            p.total_questions,
            p.attempts,
            state
        );
    }
    Ok(())
}

pub async fn questions(app: &App, level: Option<u8>) -> Result<()> {
    let filter = level
        .map(|value| Level::new(value).ok_or_else(|| anyhow!("Level must be 1, 2, or 3")))
        .transpose()?;

    let catalog = match app.client.all_questions().await {
        Ok(catalog) => {
            if let Err(e) = app.cache.save_catalog(&catalog) {
                warn!(error = %e, "Failed to cache question catalog");
            }
            catalog
        }
        Err(e) if e.is_network() => {
            let cached = app.cache.load_catalog()?.ok_or_else(|| anyhow!(e))?;
            println!("{}", offline_notice("questions", &cached));
            cached.data
        }
        Err(e) => return Err(e.into()),
    };

    let editor = LevelEditor::new(catalog);
    let counts = editor.count_by_level();
    for level in Level::ALL {
        if filter.is_some_and(|f| f != level) {
            continue;
        }
        println!("{} ({} questions)", level, counts.get(&level).copied().unwrap_or(0));
        for question in editor.questions().iter().filter(|q| q.level == level) {
            println!(
                "  #{:<5} {}",
                question.id,
                truncate_string(&question.question, LISTING_TEXT_WIDTH)
            );
        }
    }
    Ok(())
}

/// Apply `ID=LEVEL` assignments and save the ones that change something
pub async fn set_level(app: &App, assignments: &[String]) -> Result<()> {
    let parsed = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>>>()?;

    let mut editor = LevelEditor::new(app.client.all_questions().await?);
    for (id, level) in &parsed {
        if !editor.set_level(*id, *level) {
            bail!("Question #{} not found", id);
        }
    }

    let changes = editor.changes();
    if changes.is_empty() {
        println!("No changes to save");
        return Ok(());
    }

    let saved = app.client.save_level_changes(&changes).await?;
    editor.commit();
    println!("Successfully updated {} question(s)!", saved);
    Ok(())
}

fn parse_assignment(assignment: &str) -> Result<(i64, Level)> {
    let (id, level) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected ID=LEVEL, got {:?}", assignment))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid question id: {:?}", id))?;
    let level = level
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(Level::new)
        .ok_or_else(|| anyhow!("Level must be 1, 2, or 3"))?;
    Ok((id, level))
}
