/// Host events the poll loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    Visible,
    Hidden,
    Online,
    Offline,
    /// Refresh now, regardless of the timer.
    RefreshNow,
    Unload,
}

impl PageEvent {
    /// Parse one line of host input such as `visible` or `quit`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "visible" | "show" => Some(PageEvent::Visible),
            "hidden" | "hide" => Some(PageEvent::Hidden),
            "online" => Some(PageEvent::Online),
            "offline" => Some(PageEvent::Offline),
            "refresh" | "r" => Some(PageEvent::RefreshNow),
            "quit" | "q" | "unload" => Some(PageEvent::Unload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_commands() {
        assert_eq!(PageEvent::parse(" Visible\n"), Some(PageEvent::Visible));
        assert_eq!(PageEvent::parse("offline"), Some(PageEvent::Offline));
        assert_eq!(PageEvent::parse("r"), Some(PageEvent::RefreshNow));
        assert_eq!(PageEvent::parse("quit"), Some(PageEvent::Unload));
        assert_eq!(PageEvent::parse("dance"), None);
        assert_eq!(PageEvent::parse(""), None);
    }
}
