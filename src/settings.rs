use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::error::SettingsError;

/// Sampling parameters sent with every generation request, plus the memory
/// window length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_new_tokens: u32,
    pub repetition_penalty: f32,
    /// Number of prior exchanges replayed into each prompt
    pub memory_k: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            max_new_tokens: 256,
            repetition_penalty: 1.2,
            memory_k: 3,
        }
    }
}

/// One adjustable field of [`Settings`], in sidebar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum SettingField {
    Temperature,
    TopP,
    MaxNewTokens,
    RepetitionPenalty,
    MemoryK,
}

/// Slider bounds for a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SettingField {
    pub fn all() -> Vec<SettingField> {
        SettingField::iter().collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingField::Temperature => "temperature",
            SettingField::TopP => "p for nucleus sampling",
            SettingField::MaxNewTokens => "max tokens to output",
            SettingField::RepetitionPenalty => "repetition penalty",
            SettingField::MemoryK => "memory length",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            SettingField::Temperature => {
                "Higher values give more diverse output but stray from context more often."
            }
            SettingField::TopP => {
                "Sample only from the smallest set of words whose probabilities sum to p."
            }
            SettingField::MaxNewTokens => {
                "Upper bound on tokens per reply. Small values truncate responses."
            }
            SettingField::RepetitionPenalty => "1.0 means no penalty; higher values discourage repetition.",
            SettingField::MemoryK => "How many prior exchanges are replayed into each prompt.",
        }
    }

    pub fn range(self) -> Range {
        match self {
            SettingField::Temperature => Range { min: 0.1, max: 2.0, step: 0.1 },
            SettingField::TopP => Range { min: 0.10, max: 0.99, step: 0.01 },
            SettingField::MaxNewTokens => Range { min: 10.0, max: 512.0, step: 1.0 },
            SettingField::RepetitionPenalty => Range { min: 1.0, max: 3.0, step: 0.1 },
            SettingField::MemoryK => Range { min: 0.0, max: 10.0, step: 1.0 },
        }
    }

    fn decimals(self) -> usize {
        match self {
            SettingField::TopP => 2,
            SettingField::Temperature | SettingField::RepetitionPenalty => 1,
            SettingField::MaxNewTokens | SettingField::MemoryK => 0,
        }
    }
}

impl Settings {
    pub fn get(&self, field: SettingField) -> f64 {
        match field {
            SettingField::Temperature => self.temperature as f64,
            SettingField::TopP => self.top_p as f64,
            SettingField::MaxNewTokens => self.max_new_tokens as f64,
            SettingField::RepetitionPenalty => self.repetition_penalty as f64,
            SettingField::MemoryK => self.memory_k as f64,
        }
    }

    fn set(&mut self, field: SettingField, value: f64) {
        match field {
            SettingField::Temperature => self.temperature = value as f32,
            SettingField::TopP => self.top_p = value as f32,
            SettingField::MaxNewTokens => self.max_new_tokens = value as u32,
            SettingField::RepetitionPenalty => self.repetition_penalty = value as f32,
            SettingField::MemoryK => self.memory_k = value as usize,
        }
    }

    /// Move `field` by `steps` slider notches, clamped to its range.
    pub fn step(&mut self, field: SettingField, steps: i32) {
        let range = field.range();
        let notch = ((self.get(field) - range.min) / range.step).round() + steps as f64;
        let max_notch = ((range.max - range.min) / range.step).round();
        let notch = notch.clamp(0.0, max_notch);
        let scale = 10f64.powi(field.decimals() as i32);
        let value = ((range.min + notch * range.step) * scale).round() / scale;
        self.set(field, value);
    }

    /// Human-readable value for display in the sidebar.
    pub fn display(&self, field: SettingField) -> String {
        format!("{:.*}", field.decimals(), self.get(field))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for field in SettingField::iter() {
            let range = field.range();
            let value = self.get(field);
            // f32 storage drifts slightly from the decimal bounds
            let eps = 1e-6;
            if !value.is_finite() || value < range.min - eps || value > range.max + eps {
                return Err(SettingsError::OutOfRange {
                    field: field.label(),
                    min: range.min,
                    max: range.max,
                    value,
                });
            }
        }
        Ok(())
    }
}
