//! Compiled-in level catalog. Level ids are 1-based and match the
//! `currentLevel` values stored in the game state document.

/// One trivia level: an SQL-flavoured question and the answer the host expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub id: u32,
    pub question: &'static str,
    pub answer: &'static str,
}

impl Level {
    /// Whether a submission matches the expected answer, ignoring case and
    /// surrounding whitespace. The placeholder never matches.
    pub fn matches(&self, submitted: &str) -> bool {
        !self.answer.is_empty() && submitted.trim().eq_ignore_ascii_case(self.answer)
    }
}

/// Returned when the current level has no catalog entry.
pub const PLACEHOLDER: Level = Level {
    id: 0,
    question: "Esperando al siguiente nivel...",
    answer: "",
};

const LEVELS: &[Level] = &[
    Level {
        id: 1,
        question: "SELECT juego FROM rondas WHERE orden = 1;",
        answer: "luz roja luz verde",
    },
    Level {
        id: 2,
        question: "SELECT forma FROM galletas WHERE dificultad = 'minima';",
        answer: "triangulo",
    },
    Level {
        id: 3,
        question: "SELECT lema FROM casa WHERE prioridad = 1;",
        answer: "familia primero",
    },
    Level {
        id: 4,
        question: "SELECT COUNT(*) FROM jugadores WHERE ronda = 0;",
        answer: "456",
    },
    Level {
        id: 5,
        question: "SELECT color FROM uniformes WHERE rol = 'guardia';",
        answer: "rosa",
    },
    Level {
        id: 6,
        question: "SELECT apellido FROM anfitriones ORDER BY llegada LIMIT 1;",
        answer: "Silva",
    },
    Level {
        id: 7,
        question: "SELECT SUM(premio) FROM bote WHERE moneda = 'won';",
        answer: "45600000000",
    },
    Level {
        id: 8,
        question: "SELECT nombre FROM juegos WHERE final = TRUE;",
        answer: "calamar",
    },
];

/// Every level, in play order.
pub fn all() -> &'static [Level] {
    LEVELS
}

/// Catalog entry for `id`, if any.
pub fn level(id: u32) -> Option<&'static Level> {
    LEVELS.iter().find(|level| level.id == id)
}

/// Catalog entry for `id`, or [`PLACEHOLDER`] when none matches.
pub fn level_or_placeholder(id: u32) -> &'static Level {
    level(id).unwrap_or(&PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_one_based_and_contiguous() {
        for (index, level) in all().iter().enumerate() {
            assert_eq!(level.id as usize, index + 1);
        }
    }

    #[test]
    fn level_three_is_familia_primero() {
        assert_eq!(level_or_placeholder(3).answer, "familia primero");
    }

    #[test]
    fn unknown_level_falls_back_to_placeholder() {
        let fallback = level_or_placeholder(99);
        assert_eq!(fallback, &PLACEHOLDER);
        assert!(fallback.answer.is_empty());
        assert_eq!(level_or_placeholder(0), &PLACEHOLDER);
    }

    #[test]
    fn matching_ignores_case_and_padding() {
        let level = level_or_placeholder(6);
        assert!(level.matches("  silva "));
        assert!(!level.matches("Silvia"));
        assert!(!PLACEHOLDER.matches(""));
    }
}
