use clap::ValueEnum;
use serde::Serialize;

use crate::config::{Configuration, ModelId, Provider};

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DetailLevel {
    Brief,
    #[default]
    Normal,
    Detailed,
}

impl DetailLevel {
    fn instruction(&self) -> &'static str {
        match self {
            Self::Brief => "Provide a brief, high-level explanation of what this code does.",
            Self::Normal => {
                "Explain what this code does, how it works, and any important concepts or patterns used."
            }
            Self::Detailed => {
                "Provide a detailed explanation including line-by-line analysis, algorithms used, \
                 time complexity, and potential improvements."
            }
        }
    }
}

/// Provider-neutral request handed to a provider client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRequest {
    pub provider: Provider,
    pub model: ModelId,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl PreparedRequest {
    fn new(config: &Configuration, messages: Vec<Message>) -> Self {
        Self {
            provider: config.provider,
            model: config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            messages,
        }
    }

    pub fn ask(config: &Configuration, question: &str, system: Option<&str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.map(str::trim).filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(question));
        Self::new(config, messages)
    }

    pub fn code(config: &Configuration, prompt: &str, language: Option<&str>) -> Self {
        let mut system = String::from(
            "You are an expert programmer. Generate clean, well-documented, and efficient code. ",
        );
        if let Some(language) = language.map(str::trim).filter(|l| !l.is_empty()) {
            system.push_str(&format!("Write the code in {language}. "));
        }
        system.push_str(
            "Include comments explaining complex logic and provide a brief explanation of what \
             the code does.",
        );
        Self::new(config, vec![Message::system(system), Message::user(prompt)])
    }

    pub fn explain(
        config: &Configuration,
        code: &str,
        language: Option<&str>,
        detail: DetailLevel,
    ) -> Self {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| detect_language(code));
        let system = format!(
            "You are an expert programmer. {} The code is written in {language}. \
             Be clear, concise, and educational in your explanation.",
            detail.instruction()
        );
        let user = format!("Please explain this {language} code:\n\n{code}");
        Self::new(config, vec![Message::system(system), Message::user(user)])
    }

    /// Opening request of a chat session.
    pub fn chat(config: &Configuration, system: Option<&str>) -> Self {
        let system = system
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(CHAT_SYSTEM_PROMPT);
        Self::new(config, vec![Message::system(system)])
    }
}

/// Guesses a language from the first tokens of `code`. Falls back to `text`.
pub fn detect_language(code: &str) -> &'static str {
    let text = code.trim_start().to_ascii_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| text.starts_with(*p));

    if starts(&["def ", "import ", "from ", "class ", "if __name__"]) {
        "python"
    } else if starts(&["function ", "const ", "let ", "var ", "console.log"]) {
        "javascript"
    } else if starts(&["public class", "private ", "public ", "import java"]) {
        "java"
    } else if starts(&["package ", "func "]) {
        "go"
    } else if starts(&["fn ", "use ", "pub ", "impl ", "mod "]) {
        "rust"
    } else if starts(&["<?php", "$"]) {
        "php"
    } else if starts(&["module ", "require "]) {
        "ruby"
    } else if starts(&["using ", "namespace "]) {
        "csharp"
    } else if starts(&["#include", "int main", "void "]) {
        "c"
    } else if starts(&["<!doctype", "<html"]) {
        "html"
    } else if starts(&["select ", "insert ", "update ", "delete from "]) {
        "sql"
    } else if starts(&["---", "- "]) {
        "yaml"
    } else if starts(&["{", "["]) {
        "json"
    } else {
        "text"
    }
}
