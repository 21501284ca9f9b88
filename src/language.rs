use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::tokenizer::{EnglishTokenizer, SpanishTokenizer, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    EN,
    #[serde(rename = "es")]
    ES,
}

impl Language {
    pub fn tokenizer(self) -> &'static dyn Tokenizer {
        match self {
            Language::EN => &EnglishTokenizer,
            Language::ES => &SpanishTokenizer,
        }
    }
}

impl FromStr for Language {
    type Err = NluError;

    fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Language::EN),
            "es" => Ok(Language::ES),
            _ => Err(NluError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Language::EN => write!(f, "en"),
            Language::ES => write!(f, "es"),
        }
    }
}
