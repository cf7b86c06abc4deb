use dialoguer::{Confirm, Input, MultiSelect, Select};

use crate::Result;

/// Source of the user's answers
///
/// The interactive implementation is [`TerminalPrompter`], tests drive
/// the session with a scripted one.
pub trait Prompter {
    /// Free text, an empty answer yields `default` when one is given
    fn text(&mut self, prompt: &str, default: Option<&str>) -> Result<String>;

    /// Index of the chosen item
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize>;

    /// Indices of all checked items, may be empty
    fn multi_select(&mut self, prompt: &str, items: &[&str], checked: &[bool])
    -> Result<Vec<usize>>;

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;

    /// Shows a message to the user
    fn notify(&mut self, message: &str);
}

/// Prompts on the terminal using dialoguer
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<usize> {
        Ok(Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?)
    }

    fn multi_select(
        &mut self,
        prompt: &str,
        items: &[&str],
        checked: &[bool],
    ) -> Result<Vec<usize>> {
        let defaults: Vec<bool> = (0..items.len())
            .map(|i| checked.get(i).copied().unwrap_or(false))
            .collect();
        Ok(MultiSelect::new()
            .with_prompt(prompt)
            .items(items)
            .defaults(&defaults)
            .interact()?)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn notify(&mut self, message: &str) {
        println!("\n{}", message);
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use anyhow::{anyhow, bail};

    use super::*;

    /// One scripted answer, consumed in order
    #[derive(Debug, Clone)]
    pub enum Answer {
        Text(&'static str),
        Choice(usize),
        Choices(Vec<usize>),
        Yes,
        No,
    }

    /// Replays a fixed list of answers and records every message it was shown
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        answers: VecDeque<Answer>,
        pub messages: Vec<String>,
        pub prompts: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
            Self {
                answers: answers.into_iter().collect(),
                ..Default::default()
            }
        }

        pub fn remaining(&self) -> usize {
            self.answers.len()
        }

        fn next(&mut self, prompt: &str) -> Result<Answer> {
            self.prompts.push(prompt.to_string());
            self.answers
                .pop_front()
                .ok_or_else(|| anyhow!("No scripted answer left for: {}", prompt))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn text(&mut self, prompt: &str, default: Option<&str>) -> Result<String> {
            match self.next(prompt)? {
                Answer::Text("") => Ok(default.unwrap_or_default().to_string()),
                Answer::Text(text) => Ok(text.to_string()),
                other => bail!("Expected text for {}, got {:?}", prompt, other),
            }
        }

        fn select(&mut self, prompt: &str, items: &[&str], _default: usize) -> Result<usize> {
            match self.next(prompt)? {
                Answer::Choice(index) if index < items.len() => Ok(index),
                other => bail!("Expected a choice for {}, got {:?}", prompt, other),
            }
        }

        fn multi_select(
            &mut self,
            prompt: &str,
            items: &[&str],
            _checked: &[bool],
        ) -> Result<Vec<usize>> {
            match self.next(prompt)? {
                Answer::Choices(indices) if indices.iter().all(|i| *i < items.len()) => {
                    Ok(indices)
                }
                other => bail!("Expected choices for {}, got {:?}", prompt, other),
            }
        }

        fn confirm(&mut self, prompt: &str, _default: bool) -> Result<bool> {
            match self.next(prompt)? {
                Answer::Yes => Ok(true),
                Answer::No => Ok(false),
                other => bail!("Expected yes/no for {}, got {:?}", prompt, other),
            }
        }

        fn notify(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }
}
