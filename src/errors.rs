use failure::Fail;

#[derive(Debug, Fail)]
pub enum NluError {
    #[fail(display = "Unsupported language '{}', expected 'en' or 'es'", _0)]
    UnsupportedLanguage(String),
    #[fail(display = "Invalid pipeline configuration: {}", _0)]
    InvalidConfiguration(String),
    #[fail(display = "Invalid dataset: {}", _0)]
    InvalidDataset(String),
    #[fail(display = "Unknown intent: '{}'", _0)]
    UnknownIntent(String),
    #[fail(display = "Unable to read file '{}'", _0)]
    ModelLoad(String),
    #[fail(display = "Expected model version {} but found {}", runner, model)]
    WrongModelVersion { model: String, runner: &'static str },
    #[fail(
        display = "Grammar syntax error at line {}, column {}: {}",
        line, column, message
    )]
    GrammarSyntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[fail(display = "Grammar error: {}", _0)]
    Grammar(String),
}

pub type Result<T> = ::std::result::Result<T, ::failure::Error>;
