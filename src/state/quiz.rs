use std::sync::Arc;

use crate::library::{AudioHandle, LibraryError, LibraryResult, SongLibrary, SongMeta};

/// One audio question of a quiz.
#[derive(Debug, Clone)]
pub struct Question {
    /// Key the room controller streams the snippet from.
    pub audio: AudioHandle,
    /// Hint shown to players while the snippet plays.
    pub prompt: String,
    /// Accepted answer; matched trimmed and case-insensitively.
    pub solution: String,
}

impl From<SongMeta> for Question {
    fn from(meta: SongMeta) -> Self {
        let prompt = match &meta.artist {
            Some(artist) => format!("Guess the song by {artist}"),
            None => "Guess the song".to_string(),
        };
        Self {
            audio: meta.audio,
            prompt,
            solution: meta.title,
        }
    }
}

/// Immutable list of questions for one game; built once in Loading and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct Quiz {
    questions: Vec<Question>,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, round: u32) -> Option<&Question> {
        self.questions.get(round as usize)
    }

    pub fn has_round(&self, round: u32) -> bool {
        (round as usize) < self.questions.len()
    }
}

/// Assemble a quiz of up to `rounds` questions from the library. An empty
/// pick is an error; a short pick just yields a shorter game.
pub async fn load(library: Arc<dyn SongLibrary>, rounds: u32) -> LibraryResult<Quiz> {
    let picked = library.pick(rounds as usize).await?;
    if picked.is_empty() {
        return Err(LibraryError::Empty);
    }

    Ok(Quiz::new(picked.into_iter().map(Question::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str, artist: Option<&str>) -> SongMeta {
        SongMeta {
            audio: AudioHandle(format!("{title}.mp3")),
            title: title.to_string(),
            artist: artist.map(str::to_string),
        }
    }

    #[test]
    fn question_prompt_uses_artist_when_known() {
        let question = Question::from(meta("Firelink Shrine", Some("Motoi Sakuraba")));
        assert_eq!(question.prompt, "Guess the song by Motoi Sakuraba");
        assert_eq!(question.solution, "Firelink Shrine");
    }

    #[test]
    fn question_prompt_falls_back_without_artist() {
        let question = Question::from(meta("Firelink Shrine", None));
        assert_eq!(question.prompt, "Guess the song");
    }

    #[test]
    fn quiz_round_bounds() {
        let quiz = Quiz::new(vec![
            Question::from(meta("a", None)),
            Question::from(meta("b", None)),
        ]);
        assert_eq!(quiz.len(), 2);
        assert!(quiz.has_round(1));
        assert!(!quiz.has_round(2));
        assert_eq!(quiz.question(1).unwrap().solution, "b");
        assert!(quiz.question(2).is_none());
    }
}
