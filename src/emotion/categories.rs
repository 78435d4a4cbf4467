//! Emotion category definitions.
//!
//! Each category carries the cue lexicon used by the lexicon classifier and
//! the descriptive prompt embedded by the prototype classifier. Changing a
//! prompt changes prototype classifications, so treat prompts as versioned data.

use super::Emotion;

/// A fixed emotion category with its classification data
#[derive(Debug, Clone)]
pub struct EmotionDefinition {
    /// Category this definition describes
    pub emotion: Emotion,
    /// Display name
    pub name: &'static str,
    /// Descriptive prompt for zero-shot (embedding) classification
    pub prompt: &'static str,
    /// Cue words; a token matches a cue exactly, or by prefix for cues of 5+ characters
    pub cues: &'static [&'static str],
    /// Category receiving the weight when a cue is negated ("not happy")
    pub opposite: Emotion,
    /// Default category weight applied after cue counting
    pub default_weight: f32,
    /// Valence hint (-1.0 to 1.0, negative to positive)
    pub valence_hint: f32,
    /// Arousal hint (-1.0 to 1.0, calm to energetic)
    pub arousal_hint: f32,
}

impl EmotionDefinition {
    /// Check whether a normalized token is one of this category's cues
    pub fn matches(&self, token: &str) -> bool {
        self.cues
            .iter()
            .any(|cue| token == *cue || (cue.len() >= 5 && token.starts_with(cue)))
    }
}

/// Words that strengthen the next cue ("so sad")
pub const INTENSIFIERS: &[&str] = &[
    "very",
    "so",
    "really",
    "extremely",
    "super",
    "incredibly",
    "totally",
    "deeply",
    "utterly",
];

/// Words that flip the next cue toward its opposite ("not happy")
pub const NEGATIONS: &[&str] = &[
    "not", "no", "never", "don't", "dont", "isn't", "isnt", "aren't", "wasn't", "hardly",
    "without", "nor",
];

/// How many tokens before a cue are inspected for intensifiers and negations
pub const MODIFIER_WINDOW: usize = 3;

// ============================================================================
// Categories
// ============================================================================

pub const HAPPY: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Happy,
    name: "Happy",
    prompt: "happy joyful cheerful feel-good uplifting story full of laughter, warmth and fun",
    cues: &[
        "happy", "happiness", "joy", "joyful", "cheerful", "glad", "delighted", "great",
        "good", "fun", "laugh", "laughing", "smile", "smiling", "wonderful", "upbeat",
        "merry", "content", "blessed", "funny", "comedy", "celebrate",
    ],
    opposite: Emotion::Sad,
    default_weight: 1.0,
    valence_hint: 0.9,
    arousal_hint: 0.4,
};

pub const SAD: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Sad,
    name: "Sad",
    prompt: "sad melancholic heartbreaking tearjerker drama about grief, loss and sorrow",
    cues: &[
        "sad", "sadness", "unhappy", "down", "depressed", "depressing", "blue", "cry",
        "crying", "tears", "grief", "grieving", "sorrow", "heartbroken", "heartbreak",
        "melancholy", "melancholic", "miserable", "gloomy", "loss", "mourning", "hopeless",
    ],
    opposite: Emotion::Happy,
    default_weight: 1.0,
    valence_hint: -0.8,
    arousal_hint: -0.4,
};

pub const EXCITED: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Excited,
    name: "Excited",
    prompt: "exciting thrilling action-packed adventure with high energy, chases and spectacle",
    cues: &[
        "excited", "exciting", "thrill", "thrilled", "thrilling", "energetic", "pumped",
        "hyped", "adrenaline", "adventure", "action", "wild", "eager", "energized",
        "enthusiastic",
    ],
    opposite: Emotion::Calm,
    default_weight: 1.0,
    valence_hint: 0.7,
    arousal_hint: 0.9,
};

pub const CALM: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Calm,
    name: "Calm",
    prompt: "calm peaceful gentle slow-paced relaxing story with serene quiet atmosphere",
    cues: &[
        "calm", "peaceful", "relaxed", "relaxing", "relax", "chill", "serene", "quiet",
        "cozy", "cosy", "tranquil", "mellow", "rested", "gentle", "easygoing", "soothing",
    ],
    opposite: Emotion::Anxious,
    default_weight: 1.0,
    valence_hint: 0.5,
    arousal_hint: -0.8,
};

pub const ANGRY: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Angry,
    name: "Angry",
    prompt: "angry furious intense revenge story full of rage, conflict and confrontation",
    cues: &[
        "angry", "anger", "mad", "furious", "rage", "raging", "annoyed", "irritated",
        "frustrated", "frustration", "pissed", "resentful", "revenge", "hate", "hateful",
    ],
    opposite: Emotion::Calm,
    default_weight: 1.0,
    valence_hint: -0.7,
    arousal_hint: 0.8,
};

pub const ANXIOUS: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Anxious,
    name: "Anxious",
    prompt: "tense anxious suspenseful thriller with dread, fear and nervous uncertainty",
    cues: &[
        "anxious", "anxiety", "nervous", "worried", "worry", "stressed", "stress", "scared",
        "afraid", "fear", "panic", "tense", "uneasy", "restless", "overwhelmed", "dread",
    ],
    opposite: Emotion::Calm,
    default_weight: 1.0,
    valence_hint: -0.6,
    arousal_hint: 0.7,
};

pub const ROMANTIC: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Romantic,
    name: "Romantic",
    prompt: "romantic love story about passion, tenderness, dating and falling in love",
    cues: &[
        "romantic", "romance", "love", "loving", "lovely", "crush", "passionate", "passion",
        "tender", "affectionate", "date", "dating", "flirty", "valentine",
    ],
    opposite: Emotion::Lonely,
    default_weight: 1.0,
    valence_hint: 0.7,
    arousal_hint: 0.2,
};

pub const INSPIRED: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Inspired,
    name: "Inspired",
    prompt: "inspiring motivational true story of courage, hope, triumph and perseverance",
    cues: &[
        "inspired", "inspiring", "inspiration", "motivated", "motivation", "hopeful", "hope",
        "determined", "ambitious", "brave", "courage", "courageous", "uplifted", "empowered",
    ],
    opposite: Emotion::Sad,
    default_weight: 1.0,
    valence_hint: 0.8,
    arousal_hint: 0.5,
};

pub const LONELY: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Lonely,
    name: "Lonely",
    prompt: "lonely isolated story about solitude, abandonment and longing for connection",
    cues: &[
        "lonely", "loneliness", "alone", "isolated", "isolation", "abandoned", "empty",
        "worthless", "unloved", "solitude", "left", "forgotten", "homesick",
    ],
    opposite: Emotion::Happy,
    default_weight: 1.0,
    valence_hint: -0.7,
    arousal_hint: -0.5,
};

pub const NEUTRAL: EmotionDefinition = EmotionDefinition {
    emotion: Emotion::Neutral,
    name: "Neutral",
    prompt: "ordinary everyday story with a balanced neutral tone, neither light nor dark",
    cues: &[
        "okay", "ok", "fine", "normal", "neutral", "whatever", "meh", "average", "alright",
        "bored", "boring", "indifferent", "ordinary",
    ],
    opposite: Emotion::Sad,
    default_weight: 1.0,
    valence_hint: 0.0,
    arousal_hint: 0.0,
};

/// All definitions, in `Emotion::ALL` order
pub const DEFINITIONS: [EmotionDefinition; Emotion::COUNT] = [
    HAPPY, SAD, EXCITED, CALM, ANGRY, ANXIOUS, ROMANTIC, INSPIRED, LONELY, NEUTRAL,
];

/// Look up the definition for a category
pub fn definition(emotion: Emotion) -> &'static EmotionDefinition {
    &DEFINITIONS[emotion.index()]
}
