use survey_spec::{
    AnswerExport, QuestionSpec, QuestionType, SubmitSpec, SurveyEvent, SurveySpec, SurveyState,
    ValidationOutcome,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: cursor, visible questions, list events.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and survey progress for the text wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, spec: &SurveySpec) {
        if self.header_printed {
            return;
        }
        let title = spec
            .title
            .as_deref()
            .or(spec.id.as_deref())
            .unwrap_or("Survey");
        println!("Survey: {}", title);
        self.header_printed = true;
    }

    pub fn show_status(&self, survey: &SurveyState) {
        if !self.verbosity.is_verbose() {
            return;
        }
        let Ok(filter) = survey.filter() else {
            return;
        };
        println!(
            "Status: {} of {} visible questions revealed",
            survey.visible_question_count().min(filter.size()),
            filter.size()
        );
        println!("Visible questions:");
        for id in filter.visible_ids() {
            let mut entry = format!(" - {}", id);
            if survey.state(id).is_some_and(|state| state.is_answered()) {
                entry.push_str(" [answered]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        if let Some(header) = &prompt.header {
            println!("{}", header);
        }
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if !prompt.fields.is_empty() {
            println!("Fields: {}", prompt.fields.join(", "));
        }
        if self.verbosity.is_verbose() && !prompt.options.is_empty() {
            println!("Options: {}", prompt.options.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation(&self, outcome: &ValidationOutcome) {
        for failure in &outcome.failures {
            eprintln!("Invalid answer: {}", failure);
        }
    }

    pub fn show_events(&self, events: &[SurveyEvent]) {
        if !self.verbosity.is_verbose() {
            return;
        }
        for event in events {
            let line = match event {
                SurveyEvent::QuestionInserted(position) => {
                    format!("question inserted at {}", position)
                }
                SurveyEvent::QuestionRemoved(position) => {
                    format!("question removed at {}", position)
                }
                SurveyEvent::QuestionChanged(position) => {
                    format!("question changed at {}", position)
                }
                SurveyEvent::SubmitButtonInserted(position) => {
                    format!("submit button inserted at {}", position)
                }
            };
            println!("Event: {}", line);
        }
    }

    pub fn show_completion(&self, export: &AnswerExport, submit: Option<&SubmitSpec>) {
        match submit {
            Some(submit) => println!("{} ✅ (submits to {})", submit.button_title, submit.url),
            None => println!("Done ✅"),
        }
        match export.to_cbor() {
            Ok(bytes) => {
                println!("Answers (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize answers to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match export.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize answers to JSON: {}", err);
                }
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub header: Option<String>,
    pub hint: Option<String>,
    pub options: Vec<String>,
    pub fields: Vec<String>,
}

impl PromptContext {
    pub fn new(question: &QuestionSpec, position: usize, total: usize) -> Self {
        Self {
            index: position + 1,
            total: total.max(position + 1),
            title: question.label.clone().unwrap_or_else(|| question.question.clone()),
            header: question.header.clone(),
            hint: hint_for(question),
            options: question.options.clone(),
            fields: question.fields.iter().map(|field| field.id.clone()).collect(),
        }
    }
}

fn hint_for(question: &QuestionSpec) -> Option<String> {
    match question.question_type {
        QuestionType::YesNo => Some("(yes/no)".to_string()),
        QuestionType::SelectOne | QuestionType::SegmentSelect if !question.options.is_empty() => {
            Some(format!("({})", question.options.join("/")))
        }
        QuestionType::SelectMultiple => Some("(comma separated choices)".to_string()),
        QuestionType::AddTextField => Some("(comma separated entries)".to_string()),
        QuestionType::DatePicker => Some("(YYYY-MM-DD)".to_string()),
        QuestionType::MultiTextField | QuestionType::TableSelect => {
            Some("(field=value, field=value)".to_string())
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
