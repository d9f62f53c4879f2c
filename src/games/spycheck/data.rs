//! Built-in `SpyCheck` question bank.

/// `(text, answer kind)` pairs used when no question source is configured.
pub const QUESTIONS: &[(&str, u8)] = &[
    ("Pineapple belongs on pizza.", 0),
    ("Mornings are the best part of the day.", 1),
    ("How often do you cook at home?", 2),
    ("Have you ever been on a boat?", 3),
    ("Who here would survive longest on a desert island?", 4),
    ("Cats make better pets than dogs.", 0),
    ("Working from home beats working in an office.", 1),
    ("How often do you read before bed?", 2),
    ("Do you prefer summer to winter?", 3),
    ("Who here tells the best stories?", 4),
    ("Spicy food is worth the pain.", 0),
    ("How often do you forget people's names?", 2),
];

/// Rule text shown by the lobby's rule book button.
pub const RULES: &str = "\
Everyone answers the same question in secret, except the spies, who only see the answer choices.\n\
After the answers are revealed, discuss and vote for who you think is a spy.\n\
A unique top vote is interrogated and removed; a tie means nobody leaves.\n\
Citizens win when every spy is caught. Spies win when they outnumber the rest or the questions run out.";
