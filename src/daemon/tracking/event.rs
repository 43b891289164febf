use serde::{Deserialize, Serialize};

use super::session::TabId;

/// Events reported by the browser side. On the wire they are json objects tagged by `type`, for
/// example `{"type":"tabActivated","tabId":12,"url":"https://example.com/"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BrowserEvent {
    /// Another tab became the active one.
    TabActivated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    /// A tab navigated without being switched to. `url` is absent when something other than the
    /// address changed.
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    /// The browser (re)started. Carries the active tab if there is one.
    Startup {
        #[serde(default)]
        tab_id: Option<TabId>,
        #[serde(default)]
        url: Option<String>,
    },
    /// The browser is going away or to sleep.
    Suspend,
}

/// Everything the tracker reacts to. Timer events are produced by the
/// [Scheduler](crate::daemon::scheduler::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Browser(BrowserEvent),
    Tick,
    DayCheck,
    MidnightWake,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::BrowserEvent;

    #[test]
    fn test_wire_format() {
        let parsed: Vec<BrowserEvent> = [
            r#"{"type":"tabActivated","tabId":12,"url":"https://example.com/"}"#,
            r#"{"type":"tabUpdated","tabId":12}"#,
            r#"{"type":"startup"}"#,
            r#"{"type":"suspend"}"#,
        ]
        .iter()
        .map(|v| serde_json::from_str(v).unwrap())
        .collect();

        assert_eq!(
            parsed,
            vec![
                BrowserEvent::TabActivated {
                    tab_id: 12,
                    url: Some("https://example.com/".into()),
                },
                BrowserEvent::TabUpdated {
                    tab_id: 12,
                    url: None,
                },
                BrowserEvent::Startup {
                    tab_id: None,
                    url: None,
                },
                BrowserEvent::Suspend,
            ]
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(serde_json::from_str::<BrowserEvent>(r#"{"type":"tabClosed","tabId":1}"#).is_err());
    }
}
