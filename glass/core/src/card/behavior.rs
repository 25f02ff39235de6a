//! Per-kind behaviour hooks
//!
//! Each [`CardKind`] maps to a static [`KindHooks`] entry. Hooks are plain
//! functions over a card returning [`Directive`]s for the device layer; the
//! navigation engine collects them into its report. Nothing here touches the
//! tree or performs I/O.

use serde::{Deserialize, Serialize};

use super::{CardKind, CardNode};

/// What the speech recogniser should listen for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenMode {
    /// Short command phrases ("take a picture")
    Hotword,
    /// Free-form text for a reply
    Dictation,
}

/// Device-side effect requested by a card becoming visible or hidden
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Start the speech recogniser
    StartListening(ListenMode),
    /// Stop the speech recogniser
    StopListening,
    /// Open the camera viewfinder
    StartCamera,
    /// Release the camera
    StopCamera,
    /// Read text aloud
    Speak {
        /// Text to speak
        text: String,
    },
}

/// Hook signature
pub type Hook = fn(&CardNode) -> Vec<Directive>;

/// Behaviour attached to a card kind
#[derive(Clone, Copy)]
pub struct KindHooks {
    /// Run when a card of this kind becomes active
    pub on_show: Hook,
    /// Run when a card of this kind is hidden
    pub on_hide: Hook,
    /// Style class for the renderer
    pub style: &'static str,
}

impl std::fmt::Debug for KindHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindHooks")
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

fn none(_: &CardNode) -> Vec<Directive> {
    Vec::new()
}

fn listen_hotword(_: &CardNode) -> Vec<Directive> {
    vec![Directive::StartListening(ListenMode::Hotword)]
}

fn listen_dictation(_: &CardNode) -> Vec<Directive> {
    vec![Directive::StartListening(ListenMode::Dictation)]
}

fn stop_listening(_: &CardNode) -> Vec<Directive> {
    vec![Directive::StopListening]
}

fn start_camera(_: &CardNode) -> Vec<Directive> {
    vec![Directive::StartCamera]
}

fn stop_camera(_: &CardNode) -> Vec<Directive> {
    vec![Directive::StopCamera]
}

const PLAIN: KindHooks = KindHooks {
    on_show: none,
    on_hide: none,
    style: "card",
};

static START: KindHooks = KindHooks {
    style: "start",
    ..PLAIN
};
static CLOCK: KindHooks = KindHooks {
    on_show: listen_hotword,
    on_hide: stop_listening,
    style: "clock",
};
static CONTENT: KindHooks = PLAIN;
static ACTION: KindHooks = KindHooks {
    style: "action",
    ..PLAIN
};
static SHARE: KindHooks = KindHooks {
    style: "share",
    ..PLAIN
};
static REPLY: KindHooks = KindHooks {
    on_show: listen_dictation,
    on_hide: stop_listening,
    style: "reply",
};
static HTML_BUNDLE: KindHooks = KindHooks {
    style: "html-bundle",
    ..PLAIN
};
static CARD_BUNDLE: KindHooks = KindHooks {
    style: "card-bundle",
    ..PLAIN
};
static CAMERA: KindHooks = KindHooks {
    on_show: start_camera,
    on_hide: stop_camera,
    style: "camera",
};

/// Look up the hooks for a kind
#[must_use]
pub fn hooks(kind: CardKind) -> &'static KindHooks {
    match kind {
        CardKind::Start => &START,
        CardKind::Clock => &CLOCK,
        CardKind::Content => &CONTENT,
        CardKind::Action => &ACTION,
        CardKind::Share => &SHARE,
        CardKind::Reply => &REPLY,
        CardKind::HtmlBundle => &HTML_BUNDLE,
        CardKind::CardBundle => &CARD_BUNDLE,
        CardKind::Camera => &CAMERA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_listens_for_hotwords() {
        let clock = CardNode::new("clock", CardKind::Clock);
        let h = hooks(CardKind::Clock);
        assert_eq!(
            (h.on_show)(&clock),
            vec![Directive::StartListening(ListenMode::Hotword)]
        );
        assert_eq!((h.on_hide)(&clock), vec![Directive::StopListening]);
    }

    #[test]
    fn test_camera_hooks() {
        let camera = CardNode::new("camera", CardKind::Camera);
        let h = hooks(CardKind::Camera);
        assert_eq!((h.on_show)(&camera), vec![Directive::StartCamera]);
        assert_eq!((h.on_hide)(&camera), vec![Directive::StopCamera]);
    }

    #[test]
    fn test_content_has_no_side_effects() {
        let card = CardNode::new("1", CardKind::Content);
        let h = hooks(CardKind::Content);
        assert!((h.on_show)(&card).is_empty());
        assert!((h.on_hide)(&card).is_empty());
        assert_eq!(h.style, "card");
        assert_eq!(hooks(CardKind::CardBundle).style, "card-bundle");
    }
}
