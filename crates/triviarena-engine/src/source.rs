//! The trivia-provider collaborator and the option shuffle.

use rand::Rng;

use crate::EngineError;

/// One raw trivia item as delivered by a provider: the correct answer is
/// still separate from the decoys.
#[derive(Debug, Clone)]
pub struct TriviaItem {
    pub text: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

/// Supplies batches of trivia items.
///
/// Production wires an HTTP provider here; tests and the dev server use
/// [`FixtureSource`]. The returned future is `Send` because fetches run
/// inside spawned room-actor tasks; implementations can still write a
/// plain `async fn`.
pub trait QuestionSource: Send + Sync + 'static {
    /// Fetches at least `count` items, or as many as the provider has.
    fn fetch(
        &self,
        count: usize,
    ) -> impl std::future::Future<Output = Result<Vec<TriviaItem>, EngineError>> + Send;
}

/// A canned source that cycles over a fixed item list.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    items: Vec<TriviaItem>,
}

impl FixtureSource {
    pub fn new(items: Vec<TriviaItem>) -> Self {
        Self { items }
    }

    /// A small general-knowledge set for the dev server.
    pub fn sample() -> Self {
        let raw: &[(&str, &str, [&str; 3], &str, &str)] = &[
            ("What is the capital of Australia?", "Canberra", ["Sydney", "Melbourne", "Perth"], "Geography", "easy"),
            ("Which planet has the most moons?", "Saturn", ["Jupiter", "Neptune", "Mars"], "Science", "medium"),
            ("Who painted the Mona Lisa?", "Leonardo da Vinci", ["Michelangelo", "Raphael", "Donatello"], "Art", "easy"),
            ("What year did the Berlin Wall fall?", "1989", ["1987", "1991", "1993"], "History", "medium"),
            ("Which element has the symbol Fe?", "Iron", ["Fluorine", "Lead", "Tin"], "Science", "easy"),
            ("What is the largest ocean on Earth?", "Pacific", ["Atlantic", "Indian", "Arctic"], "Geography", "easy"),
            ("Who wrote 'One Hundred Years of Solitude'?", "Gabriel Garcia Marquez", ["Jorge Luis Borges", "Pablo Neruda", "Isabel Allende"], "Literature", "hard"),
            ("How many bits are in a byte?", "8", ["4", "16", "32"], "Technology", "easy"),
            ("Which country hosted the 2016 Summer Olympics?", "Brazil", ["China", "United Kingdom", "Japan"], "Sports", "easy"),
            ("What is the smallest prime number?", "2", ["1", "3", "0"], "Mathematics", "easy"),
        ];
        Self::new(
            raw.iter()
                .map(|(text, correct, wrong, category, difficulty)| TriviaItem {
                    text: (*text).into(),
                    correct_answer: (*correct).into(),
                    incorrect_answers: wrong.iter().map(|w| (*w).into()).collect(),
                    category: (*category).into(),
                    difficulty: (*difficulty).into(),
                })
                .collect(),
        )
    }
}

impl QuestionSource for FixtureSource {
    async fn fetch(&self, count: usize) -> Result<Vec<TriviaItem>, EngineError> {
        if self.items.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.items.iter().cloned().cycle().take(count).collect())
    }
}

/// Shuffles `[correct] ∪ incorrect` with Fisher–Yates and returns the
/// options plus the post-shuffle index of the correct answer.
///
/// An explicit swap loop, not sort-by-random-key — the latter biases the
/// permutation.
pub fn shuffle_options<R: Rng>(
    rng: &mut R,
    correct: String,
    incorrect: Vec<String>,
) -> (Vec<String>, u8) {
    let mut options = Vec::with_capacity(1 + incorrect.len());
    options.push(correct);
    options.extend(incorrect);

    let mut correct_pos = 0usize;
    for i in (1..options.len()).rev() {
        let j = rng.random_range(0..=i);
        options.swap(i, j);
        if correct_pos == i {
            correct_pos = j;
        } else if correct_pos == j {
            correct_pos = i;
        }
    }
    (options, correct_pos as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_tracks_correct_index() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let (options, idx) = shuffle_options(
                &mut rng,
                "right".into(),
                vec!["a".into(), "b".into(), "c".into()],
            );
            assert_eq!(options.len(), 4);
            assert_eq!(options[idx as usize], "right");
        }
    }

    #[test]
    fn test_shuffle_keeps_all_options() {
        let mut rng = rand::rng();
        let (mut options, _) = shuffle_options(
            &mut rng,
            "w".into(),
            vec!["x".into(), "y".into(), "z".into()],
        );
        options.sort();
        assert_eq!(options, vec!["w", "x", "y", "z"]);
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        // With 400 shuffles the correct answer should land on each of the
        // four slots at least once; a biased shuffle pinning it to slot 0
        // fails here.
        let mut rng = rand::rng();
        let mut seen = [false; 4];
        for _ in 0..400 {
            let (_, idx) = shuffle_options(
                &mut rng,
                "c".into(),
                vec!["1".into(), "2".into(), "3".into()],
            );
            seen[idx as usize] = true;
        }
        assert!(seen.iter().all(|s| *s), "correct index never hit some slot");
    }

    #[tokio::test]
    async fn test_fixture_source_cycles_to_requested_count() {
        let source = FixtureSource::sample();
        let items = source.fetch(25).await.unwrap();
        assert_eq!(items.len(), 25);
        assert_eq!(items[0].incorrect_answers.len(), 3);
    }
}
