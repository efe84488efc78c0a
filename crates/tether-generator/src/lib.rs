pub mod random;
pub mod seq;

pub use random::{RandomGenerator, RandomGeneratorSettings};
pub use seq::SeqGenerator;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage;
/// collisions are left to the store's primary key.
pub trait Generator: Send + Sync + 'static {
    /// Generates the next short id.
    fn generate(&self) -> String;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&self) -> String {
        (**self).generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_generators_are_generators() {
        let generator: Box<dyn Generator> = Box::new(SeqGenerator::with_prefix("t"));

        assert_eq!(generator.generate(), "t000000");
        assert_eq!(generator.generate(), "t000001");
    }
}
