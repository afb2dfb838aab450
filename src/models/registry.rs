use serde::Serialize;

/// Information about a whisper.cpp ggml model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub size: &'static str,
    pub description: &'static str,
    pub english_only: bool,
    pub recommended: bool,
}

/// Registry of available models, in display order
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny",
        size: "~75 MB",
        description: "Fastest, least accurate. Good for quick testing.",
        english_only: false,
        recommended: false,
    },
    ModelInfo {
        name: "tiny.en",
        size: "~75 MB",
        description: "Fastest, English-only. Good for quick English transcription.",
        english_only: true,
        recommended: false,
    },
    ModelInfo {
        name: "base",
        size: "~142 MB",
        description: "Fast and decent accuracy. Good balance for multilingual.",
        english_only: false,
        recommended: true,
    },
    ModelInfo {
        name: "base.en",
        size: "~142 MB",
        description: "Fast and decent accuracy. Good balance for English.",
        english_only: true,
        recommended: true,
    },
    ModelInfo {
        name: "small",
        size: "~466 MB",
        description: "Better accuracy, slower processing. Good for quality multilingual transcription.",
        english_only: false,
        recommended: false,
    },
    ModelInfo {
        name: "small.en",
        size: "~466 MB",
        description: "Better accuracy, slower processing. Good for quality English transcription.",
        english_only: true,
        recommended: false,
    },
    ModelInfo {
        name: "medium",
        size: "~1.5 GB",
        description: "High accuracy, requires more resources. Professional multilingual transcription.",
        english_only: false,
        recommended: false,
    },
    ModelInfo {
        name: "medium.en",
        size: "~1.5 GB",
        description: "High accuracy, requires more resources. Professional English transcription.",
        english_only: true,
        recommended: false,
    },
    ModelInfo {
        name: "large-v1",
        size: "~3 GB",
        description: "Highest accuracy, very slow. For best quality multilingual transcription.",
        english_only: false,
        recommended: false,
    },
    ModelInfo {
        name: "large",
        size: "~3 GB",
        description: "Highest accuracy, very slow. Latest large model.",
        english_only: false,
        recommended: false,
    },
    ModelInfo {
        name: "large-v3-turbo",
        size: "~1.6 GB",
        description: "Fast large model with good accuracy. Best overall for production use.",
        english_only: false,
        recommended: true,
    },
];

impl ModelInfo {
    /// Find model by name
    #[must_use]
    pub fn find(name: &str) -> Option<&'static Self> {
        MODELS.iter().find(|m| m.name == name)
    }

    /// All catalog entries in display order
    #[must_use]
    pub const fn all() -> &'static [Self] {
        MODELS
    }

    /// Get all model names
    #[must_use]
    pub fn all_names() -> Vec<&'static str> {
        MODELS.iter().map(|m| m.name).collect()
    }

    /// Get recommended models
    #[must_use]
    pub fn recommended() -> Vec<&'static Self> {
        MODELS.iter().filter(|m| m.recommended).collect()
    }

    #[must_use]
    pub fn english_only() -> Vec<&'static Self> {
        MODELS.iter().filter(|m| m.english_only).collect()
    }

    #[must_use]
    pub fn multilingual() -> Vec<&'static Self> {
        MODELS.iter().filter(|m| !m.english_only).collect()
    }

    /// Find closest match using Levenshtein distance
    #[must_use]
    pub fn suggest(name: &str) -> Option<&'static str> {
        if name.is_empty() {
            return None;
        }

        MODELS
            .iter()
            .map(|m| (m.name, levenshtein_distance(name, m.name)))
            .min_by_key(|(_, dist)| *dist)
            .filter(|(_, dist)| *dist <= 2) // Only suggest if within 2 edits
            .map(|(model_name, _)| model_name)
    }
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row variant; `prev[j]` is the distance between a[..i] and b[..j]
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
