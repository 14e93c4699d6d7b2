//! Keyword-driven help assistant.

const GREETING: &str =
    "Hello! I am CivicAssist. How can I guide you through the CivicBridge platform?";
const FALLBACK: &str = "I'm sorry, I couldn't find a direct answer to that. \
     I can help with questions about reporting issues, using the dashboard, and features.";

/// Checked in order; the first group with a matching keyword answers.
const RULES: &[(&[&str], &str)] = &[
    (
        &["report", "issue", "pothole", "graffiti"],
        "To report an issue: run `civicbridge report` with the issue type (like Pothole or \
         Graffiti) and a description, then pinpoint the location with coordinates, an address \
         or `--here` for your current position. You can also attach photos!",
    ),
    (
        &["dashboard", "track", "progress"],
        "You can view the status of all your submitted issues on the Dashboard. Statuses are: \
         Pending (waiting review), In Progress (being fixed), and Resolved (completed).",
    ),
    (
        &["login", "signup", "account"],
        "You can log in or sign up with `civicbridge login` and `civicbridge signup`. Logging in \
         gives you access to your personal reports and the Dashboard.",
    ),
    (
        &["admin", "administrator"],
        "The Admin Dashboard is strictly for system administrators to manage, filter, and update \
         the status of ALL reports across the community.",
    ),
    (
        &["location", "map", "pinpoint"],
        "You can pinpoint a location by entering an address, giving exact coordinates, or using \
         your device's current location when submitting a report.",
    ),
    (
        &["theme", "dark mode", "settings"],
        "You can change the app's appearance (Light, Dark, Auto themes) and manage your \
         notification preferences (Push/Email) with `civicbridge settings`.",
    ),
    (
        &["data", "save", "persistence"],
        "All accounts and reports are saved by the CivicBridge server. Reports that cannot reach \
         the server are kept on this device until you run `civicbridge sync`.",
    ),
    (
        &["developer", "credit", "impactx"],
        "This application was proudly developed by Team ImpactX.",
    ),
    (
        &["photo", "evidence"],
        "Yes, you can upload up to 5 photos as evidence when submitting a report. Clear photos \
         help ensure faster resolution!",
    ),
    (
        &["thanks", "thank you"],
        "You're welcome! I'm here if you have any other questions.",
    ),
];

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey"];

/// Answer a help question. Stateless.
///
/// Greetings only count as whole words, so "this" or "they" never trigger
/// the greeting. Every other rule is a plain substring check, tried in order.
pub fn reply(message: &str) -> &'static str {
    let message = message.to_lowercase();

    let greeted = message
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| GREETING_WORDS.contains(&word));
    if greeted {
        return GREETING;
    }

    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| message.contains(k)))
        .map_or(FALLBACK, |(_, answer)| *answer)
}
