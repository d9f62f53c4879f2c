//! Built-in `SpyFall` place table.

/// `(place, extended only, roles)` used when no place source is configured.
pub const PLACES: &[(&str, bool, &[&str])] = &[
    (
        "Airplane",
        false,
        &["Pilot", "Flight attendant", "Passenger", "Air marshal", "Mechanic", "Co-pilot", "Stowaway"],
    ),
    (
        "Bank",
        false,
        &["Teller", "Manager", "Security guard", "Robber", "Customer", "Consultant", "Armored car driver"],
    ),
    (
        "Beach",
        false,
        &["Lifeguard", "Surfer", "Photographer", "Ice cream seller", "Tourist", "Kite surfer", "Beach waitress"],
    ),
    (
        "Hospital",
        false,
        &["Nurse", "Doctor", "Anesthesiologist", "Patient", "Therapist", "Surgeon", "Intern"],
    ),
    (
        "Space station",
        true,
        &["Engineer", "Alien", "Space tourist", "Pilot", "Commander", "Scientist", "Doctor"],
    ),
    (
        "Submarine",
        true,
        &["Cook", "Commander", "Sonar technician", "Electrician", "Sailor", "Navigator", "Radioman"],
    ),
];

/// Rule text shown by the lobby's rule book button.
pub const RULES: &str = "\
Everyone except the spies is told a secret place and a role there.\n\
Ask each other questions and vote to accuse a spy; half the table is enough to interrogate.\n\
A spy may guess the place at any time during the discussion: right wins the game, wrong is fatal.\n\
When time runs out a final vote decides. Catching every spy wins for the citizens.";
