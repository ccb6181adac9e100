use rand::Rng;

use crate::library::CaseLibrary;

/// Random case selection without repeats.
///
/// Draws ids in random order until the pool is exhausted, then refills and
/// allows repeats. The draw history survives session resets so a practice
/// session cycles through every case before seeing one twice.
pub struct CasePicker {
    all: Vec<String>,
    remaining: Vec<String>,
}

impl CasePicker {
    pub fn new(library: &CaseLibrary) -> Self {
        let all = library.ids();
        Self {
            remaining: all.clone(),
            all,
        }
    }

    /// Ids not yet drawn in the current cycle
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Draw the next case id using the thread RNG
    pub fn pick(&mut self) -> Option<String> {
        self.pick_with(&mut rand::thread_rng())
    }

    /// Draw the next case id using the given RNG
    pub fn pick_with<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        if self.all.is_empty() {
            return None;
        }
        if self.remaining.is_empty() {
            self.remaining = self.all.clone();
        }
        let index = rng.gen_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::CasePrompt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn library(n: usize) -> CaseLibrary {
        let cases = (0..n)
            .map(|i| CasePrompt {
                id: format!("case-{}", i),
                title: None,
                prompt_text: format!("text {}", i),
            })
            .collect();
        CaseLibrary::from_cases(cases).unwrap()
    }

    #[test]
    fn test_no_repeat_until_exhausted() {
        let library = library(5);
        let mut picker = CasePicker::new(&library);
        let mut rng = StdRng::seed_from_u64(7);

        let drawn: HashSet<String> = (0..5)
            .map(|_| picker.pick_with(&mut rng).unwrap())
            .collect();

        // Every id handed out exactly once before any repeat
        assert_eq!(drawn.len(), 5);
        assert_eq!(picker.remaining(), 0);
    }

    #[test]
    fn test_resets_after_exhaustion() {
        let library = library(3);
        let mut picker = CasePicker::new(&library);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..3 {
            picker.pick_with(&mut rng).unwrap();
        }

        // Pool refills; repeats are now allowed
        let next = picker.pick_with(&mut rng);
        assert!(next.is_some());
        assert_eq!(picker.remaining(), 2);
    }

    #[test]
    fn test_single_case_repeats() {
        let library = library(1);
        let mut picker = CasePicker::new(&library);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(picker.pick_with(&mut rng).unwrap(), "case-0");
        assert_eq!(picker.pick_with(&mut rng).unwrap(), "case-0");
    }
}
