use crate::Generator;
use std::iter;
use typed_builder::TypedBuilder;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorSettings {
    #[builder(default = 5)]
    length: usize,
}

/// Draws ids uniformly from `[A-Za-z0-9]`.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(settings: RandomGeneratorSettings) -> Self {
        Self {
            length: settings.length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(RandomGeneratorSettings::builder().build())
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> String {
        iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
            .take(self.length)
            .collect()
    }
}
