mod wizard;

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use survey_spec::{
    Answer, AnswerExport, QuestionSpec, QuestionType, SurveySpec, SurveyState, definition_schema,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based conditional survey CLI",
    long_about = "Runs survey definitions as a progressive text wizard and inspects skip logic"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a survey question by question in a text shell.
    Run {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional answers export JSON applied before the first prompt.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show verbose output (cursor, visible questions, list events).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also print the answers export as JSON on completion.
        #[arg(long)]
        answers_json: bool,
    },
    /// Apply an answers export and print which questions are visible.
    Visible {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Path to the answers export JSON.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Check a survey definition for duplicate ids and dangling conditions.
    Check {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Print the JSON schema of the survey definition format.
    Schema,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            spec,
            answers,
            verbose,
            answers_json,
        } => run_survey(&spec, answers.as_deref(), verbose, answers_json),
        Command::Visible { spec, answers } => run_visible(&spec, &answers),
        Command::Check { spec } => run_check(&spec),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&definition_schema()?)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SURVEY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "survey=debug,info"
        } else {
            "survey=info,warn"
        })
    });

    let format = env::var("SURVEY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn load_spec(path: &Path) -> CliResult<SurveySpec> {
    let contents = fs::read_to_string(path)?;
    let spec = SurveySpec::from_json_str(&contents)
        .map_err(|err| format!("invalid survey definition {}: {}", path.display(), err))?;
    debug!(path = %path.display(), questions = spec.questions.len(), "loaded survey definition");
    Ok(spec)
}

fn load_export(path: &Path) -> CliResult<AnswerExport> {
    let contents = fs::read_to_string(path)?;
    Ok(AnswerExport::from_json(&contents)?)
}

fn start_survey(spec: SurveySpec) -> CliResult<SurveyState> {
    let problems = spec.check();
    if let Some(problem) = problems.first() {
        return Err(format!("survey definition is not usable: {}", problem).into());
    }
    let mut survey = SurveyState::new(spec);
    survey.init_filter()?;
    Ok(survey)
}

/// Applies exported answers in question order, so that the reveal cursor
/// advances the way it would have during an interactive run.
fn apply_export(survey: &mut SurveyState, export: &AnswerExport) -> CliResult<()> {
    let order = survey
        .spec()
        .questions
        .iter()
        .map(|question| question.id.clone())
        .collect::<Vec<_>>();
    for id in &order {
        if let Some(answer) = export.answers.get(id) {
            survey.answer_question(id, answer.clone())?;
        }
    }
    for id in export.answers.keys().filter(|id| !order.contains(id)) {
        warn!(question_id = %id, "answer for unknown question ignored");
    }
    Ok(())
}

fn run_check(spec_path: &Path) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    let problems = spec.check();
    if problems.is_empty() {
        println!("Definition OK: {} questions", spec.questions.len());
        return Ok(());
    }
    println!("Definition problems:");
    for problem in &problems {
        println!("  - {}", problem);
    }
    Err("definition check failed".into())
}

fn run_visible(spec_path: &Path, answers_path: &Path) -> CliResult<()> {
    let mut survey = start_survey(load_spec(spec_path)?)?;
    apply_export(&mut survey, &load_export(answers_path)?)?;
    print!("{}", describe_visibility(&survey)?);
    Ok(())
}

fn describe_visibility(survey: &SurveyState) -> CliResult<String> {
    let filter = survey.filter()?;
    let cursor = survey.visible_question_count();
    let mut out = String::new();
    writeln!(
        out,
        "Revealed {} of {} visible questions",
        cursor.min(filter.size()),
        filter.size()
    )?;
    for (position, id) in filter.visible_ids().into_iter().enumerate() {
        let status = if position < cursor {
            "revealed"
        } else {
            "pending"
        };
        let answered = if survey.state(id).is_some_and(|state| state.is_answered()) {
            " answered"
        } else {
            ""
        };
        writeln!(out, "  {} {} [{}{}]", position, id, status, answered)?;
    }
    let submit = if cursor > filter.size() { "yes" } else { "no" };
    writeln!(out, "Submit revealed: {}", submit)?;
    Ok(out)
}

fn run_survey(
    spec_path: &Path,
    answers_path: Option<&Path>,
    verbose: bool,
    answers_json: bool,
) -> CliResult<()> {
    let mut survey = start_survey(load_spec(spec_path)?)?;
    if let Some(path) = answers_path {
        apply_export(&mut survey, &load_export(path)?)?;
    }

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);
    presenter.show_header(survey.spec());

    while let Some(question) = next_question(&mut survey)? {
        presenter.show_status(&survey);
        let filter = survey.filter()?;
        let position = filter.position_of(&question.id).unwrap_or_default();
        let prompt = PromptContext::new(&question, position, filter.size());
        let answer = prompt_question(&prompt, &question, &presenter)?;

        let outcome = survey.validate_answer(&question.id, &answer);
        if !outcome.valid {
            presenter.show_validation(&outcome);
            continue;
        }
        let events = survey.answer_question(&question.id, answer)?;
        presenter.show_events(&events);
    }

    info!(
        answered = survey.answer_export().answers.len(),
        "survey complete"
    );
    presenter.show_completion(&survey.answer_export(), survey.spec().submit.as_ref());
    Ok(())
}

/// The first revealed question still without an answer. When every revealed
/// question is answered, the answer in the last revealed slot is applied
/// again, which reveals the next slot.
fn next_question(survey: &mut SurveyState) -> CliResult<Option<QuestionSpec>> {
    loop {
        let filter = survey.filter()?;
        let revealed = survey.visible_question_count().min(filter.size());
        let pending = filter
            .visible_ids()
            .into_iter()
            .take(revealed)
            .find(|id| !survey.state(id).is_some_and(|state| state.is_answered()))
            .and_then(|id| survey.spec().question(id))
            .cloned();
        if pending.is_some() {
            return Ok(pending);
        }

        let Some(current) = survey.current_question()?.map(|question| question.id.clone()) else {
            return Ok(None);
        };
        let answer = survey
            .state(&current)
            .and_then(|state| state.answer())
            .cloned()
            .ok_or_else(|| format!("question '{}' lost its answer", current))?;
        debug!(question_id = %current, "confirming answered question in last slot");
        survey.answer_question(&current, answer)?;
    }
}

fn prompt_question(
    prompt: &PromptContext,
    question: &QuestionSpec,
    presenter: &WizardPresenter,
) -> CliResult<Answer> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input ended before the survey was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("survey aborted by user".into());
        }

        match parse_answer(question, trimmed) {
            Ok(answer) => return Ok(answer),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(question: &QuestionSpec, raw: &str) -> Result<Answer, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnswerParseError::new(
            "This question requires an answer.",
            None,
        ));
    }

    match question.question_type {
        QuestionType::YesNo => parse_yes_no(raw),
        QuestionType::SelectOne | QuestionType::SegmentSelect => {
            parse_choice(&question.options, raw).map(Answer::Scalar)
        }
        QuestionType::SelectMultiple => split_entries(raw)
            .map(|entry| parse_choice(&question.options, entry))
            .collect::<Result<Vec<_>, _>>()
            .map(Answer::List),
        QuestionType::AddTextField => Ok(Answer::list(split_entries(raw))),
        QuestionType::DatePicker => parse_date(raw),
        QuestionType::MultiTextField | QuestionType::TableSelect => parse_fields(question, raw),
        QuestionType::SingleTextField | QuestionType::SingleTextArea => Ok(Answer::scalar(raw)),
    }
}

fn split_entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

fn parse_yes_no(raw: &str) -> Result<Answer, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" => Ok(Answer::scalar("yes")),
        "no" | "n" | "false" | "f" | "0" => Ok(Answer::scalar("no")),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected yes/no (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_choice(options: &[String], raw: &str) -> Result<String, AnswerParseError> {
    if options.is_empty() {
        return Ok(raw.to_string());
    }
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(raw))
        .cloned()
        .ok_or_else(|| {
            AnswerParseError::new(
                format!("Choose from: {}.", options.join(", ")),
                Some(format!("'{}' is not an option", raw)),
            )
        })
}

fn parse_date(raw: &str) -> Result<Answer, AnswerParseError> {
    let parts = raw.split('-').collect::<Vec<_>>();
    let well_formed = parts.len() == 3
        && [4, 2, 2]
            .iter()
            .zip(&parts)
            .all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_digit()));
    if well_formed {
        Ok(Answer::scalar(raw))
    } else {
        Err(AnswerParseError::new(
            "Please enter a date.",
            Some("expected YYYY-MM-DD".to_string()),
        ))
    }
}

/// `field=value` pairs for multi-part questions. Table questions restrict
/// every value to the question's options.
fn parse_fields(question: &QuestionSpec, raw: &str) -> Result<Answer, AnswerParseError> {
    let mut values = BTreeMap::new();
    for pair in split_entries(raw) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AnswerParseError::new(
                "Answer each field as field=value.",
                Some(format!("'{}' has no '='", pair)),
            )
        })?;
        let key = key.trim();
        if !question.fields.is_empty() && !question.fields.iter().any(|field| field.id == key) {
            return Err(AnswerParseError::new(
                format!("Unknown field '{}'.", key),
                Some(describe_fields(question)),
            ));
        }
        let value = match question.question_type {
            QuestionType::TableSelect => parse_choice(&question.options, value.trim())?,
            _ => value.trim().to_string(),
        };
        values.insert(key.to_string(), Answer::Scalar(value));
    }

    let missing = question
        .fields
        .iter()
        .filter(|field| !values.contains_key(&field.id))
        .map(|field| field.id.as_str())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(AnswerParseError::new(
            format!("Missing fields: {}.", missing.join(", ")),
            Some(describe_fields(question)),
        ));
    }
    Ok(Answer::Composite(values))
}

fn describe_fields(question: &QuestionSpec) -> String {
    let fields = question
        .fields
        .iter()
        .map(|field| format!("{} ({})", field.id, field.label))
        .collect::<Vec<_>>();
    format!("fields: {}", fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use assert_fs::prelude::*;
    use serde_json::{Value, json};
    use survey_spec::FieldSpec;

    const ONBOARDING: &str = include_str!("../../survey-spec/tests/fixtures/onboarding.json");

    fn question(kind: QuestionType) -> QuestionSpec {
        QuestionSpec::new("q", kind, "Question?")
    }

    fn contact_fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec {
                id: "name".into(),
                label: "Name".into(),
            },
            FieldSpec {
                id: "phone".into(),
                label: "Phone".into(),
            },
        ]
    }

    #[test]
    fn parse_answer_yes_no_normalizes() {
        let question = question(QuestionType::YesNo);
        assert_eq!(parse_answer(&question, "Y").unwrap(), Answer::scalar("yes"));
        assert_eq!(parse_answer(&question, "false").unwrap(), Answer::scalar("no"));
        assert!(parse_answer(&question, "maybe").is_err());
    }

    #[test]
    fn parse_answer_rejects_empty_input() {
        let err = parse_answer(&question(QuestionType::SingleTextField), "  ").unwrap_err();
        assert_eq!(err.user_message, "This question requires an answer.");
    }

    #[test]
    fn parse_answer_select_checks_options() {
        let one = question(QuestionType::SelectOne).with_options(["Dog", "Cat"]);
        assert_eq!(parse_answer(&one, "cat").unwrap(), Answer::scalar("Cat"));
        assert!(parse_answer(&one, "fish").is_err());

        let many = question(QuestionType::SelectMultiple).with_options(["dog", "cat", "fish"]);
        assert_eq!(
            parse_answer(&many, "dog, fish").unwrap(),
            Answer::list(["dog", "fish"])
        );
        assert!(parse_answer(&many, "dog, bird").is_err());
    }

    #[test]
    fn parse_answer_add_text_field_splits_entries() {
        let question = question(QuestionType::AddTextField);
        assert_eq!(
            parse_answer(&question, "milk, eggs,,bread").unwrap(),
            Answer::list(["milk", "eggs", "bread"])
        );
    }

    #[test]
    fn parse_answer_dates_need_iso_format() {
        let question = question(QuestionType::DatePicker);
        assert_eq!(
            parse_answer(&question, "2024-02-29").unwrap(),
            Answer::scalar("2024-02-29")
        );
        assert!(parse_answer(&question, "29/02/2024").is_err());
    }

    #[test]
    fn parse_answer_fields_build_composites() {
        let mut question = question(QuestionType::MultiTextField);
        question.fields = contact_fields();
        assert_eq!(
            parse_answer(&question, "name=Grace, phone = 555-0100").unwrap(),
            Answer::composite([
                ("name", Answer::scalar("Grace")),
                ("phone", Answer::scalar("555-0100")),
            ])
        );
        let missing = parse_answer(&question, "name=Grace").unwrap_err();
        assert_eq!(missing.user_message, "Missing fields: phone.");
        assert!(parse_answer(&question, "email=x, name=a, phone=b").is_err());
    }

    #[test]
    fn parse_answer_table_rows_use_options() {
        let mut question = question(QuestionType::TableSelect).with_options(["never", "often"]);
        question.fields = contact_fields();
        assert!(parse_answer(&question, "name=often, phone=never").is_ok());
        assert!(parse_answer(&question, "name=often, phone=sometimes").is_err());
    }

    #[test]
    fn visibility_report_follows_exported_answers() {
        let mut survey = start_survey(SurveySpec::from_json_str(ONBOARDING).unwrap()).unwrap();
        let export = AnswerExport::from_json(
            &json!({ "answers": { "has_pet": "yes", "pet_kinds": ["cat"] } }).to_string(),
        )
        .unwrap();
        apply_export(&mut survey, &export).unwrap();

        let report = describe_visibility(&survey).unwrap();
        assert!(report.starts_with("Revealed 3 of 4 visible questions"));
        assert!(report.contains("  1 pet_kinds [revealed answered]"));
        assert!(report.contains("  2 age [revealed]"));
        assert!(report.contains("  3 feedback [pending]"));
        assert!(report.ends_with("Submit revealed: no\n"));
    }

    #[test]
    fn next_question_confirms_an_answered_last_slot() {
        let mut survey = start_survey(SurveySpec::from_json_str(ONBOARDING).unwrap()).unwrap();
        let export = AnswerExport::from_json(
            &json!({ "answers": { "has_pet": "no", "feedback": "fine" } }).to_string(),
        )
        .unwrap();
        apply_export(&mut survey, &export).unwrap();

        let next = next_question(&mut survey).unwrap().expect("age is pending");
        assert_eq!(next.id, "age");
        survey.answer_question("age", Answer::scalar("30")).unwrap();

        assert!(next_question(&mut survey).unwrap().is_none());
        assert_eq!(survey.visible_question_count(), 4);
        assert!(survey.is_submit_position(3).unwrap());
    }

    #[test]
    fn start_survey_rejects_broken_definitions() {
        let spec = SurveySpec::from_json_str(
            &json!({
                "questions": [
                    { "id": "a", "question_type": "yes_no", "question": "A?" },
                    { "id": "a", "question_type": "yes_no", "question": "A again?" }
                ]
            })
            .to_string(),
        )
        .unwrap();
        assert!(start_survey(spec).is_err());
    }

    #[test]
    fn schema_command_prints_definition_schema() -> Result<(), Box<dyn std::error::Error>> {
        let output = Command::cargo_bin("survey-cli")?
            .arg("schema")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let schema: Value = serde_json::from_slice(&output)?;
        assert!(schema["properties"]["questions"].is_object());
        Ok(())
    }

    #[test]
    fn check_command_reports_problems() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let good = workspace.child("onboarding.json");
        good.write_str(ONBOARDING)?;
        let output = Command::cargo_bin("survey-cli")?
            .arg("check")
            .arg("--spec")
            .arg(good.path())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        assert!(String::from_utf8(output)?.contains("Definition OK: 6 questions"));

        let broken = workspace.child("broken.json");
        broken.write_str(
            &json!({
                "questions": [{
                    "id": "a",
                    "question_type": "yes_no",
                    "question": "A?",
                    "show_if": { "type": "simple", "id": "ghost", "operation": "eq", "value": "x" }
                }]
            })
            .to_string(),
        )?;
        let output = Command::cargo_bin("survey-cli")?
            .arg("check")
            .arg("--spec")
            .arg(broken.path())
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();
        assert!(String::from_utf8(output)?.contains("unknown question 'ghost'"));
        Ok(())
    }

    #[test]
    fn run_command_walks_the_survey_to_completion() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let spec = workspace.child("onboarding.json");
        spec.write_str(ONBOARDING)?;

        let output = Command::cargo_bin("survey-cli")?
            .arg("run")
            .arg("--spec")
            .arg(spec.path())
            .arg("--answers-json")
            .write_stdin("no\n30\nfine\n")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output)?;
        assert!(stdout.contains("Survey: Getting started"));
        assert!(stdout.contains("Finish ✅"));
        assert!(stdout.contains("Answers (CBOR hex): "));
        assert!(stdout.contains("\"age\": \"30\""));
        assert!(!stdout.contains("pet_kinds"));
        Ok(())
    }

    #[test]
    fn run_command_fails_when_input_runs_out() -> Result<(), Box<dyn std::error::Error>> {
        let mut spec = tempfile::NamedTempFile::new()?;
        spec.write_all(ONBOARDING.as_bytes())?;
        Command::cargo_bin("survey-cli")?
            .arg("run")
            .arg("--spec")
            .arg(spec.path())
            .write_stdin("yes\n")
            .assert()
            .failure();
        Ok(())
    }

    #[test]
    fn visible_command_reads_answer_exports() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let spec = workspace.child("onboarding.json");
        spec.write_str(ONBOARDING)?;
        let answers = workspace.child("answers.json");
        answers.write_str(
            &json!({
                "answers": {
                    "has_pet": "no",
                    "age": "12",
                    "guardian": { "name": "Ann", "phone": "1" }
                }
            })
            .to_string(),
        )?;

        let output = Command::cargo_bin("survey-cli")?
            .arg("visible")
            .arg("--spec")
            .arg(spec.path())
            .arg("--answers")
            .arg(answers.path())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output)?;
        assert!(stdout.contains("  2 guardian [revealed answered]"));
        assert!(stdout.contains("  3 feedback [revealed]"));
        Ok(())
    }
}
