//! The match page: a parsed HTML document plus the element contract the
//! renderer relies on.
//!
//! Per match, the page pre-renders a container addressable by the match id
//! (`id="42"`, or `data-match-id="42"`) inside a `.match-card`. The card
//! exposes `.matchname.left` / `.matchname.right`, a `.matchTime .stsrt`
//! time node, and optionally `.info ul`, `.matchlogo.{left,right} img` and
//! `.scorers.{left,right}`. The page itself is never restructured: only the
//! content of those nodes and the container's classes change.

use ego_tree::{NodeId, NodeMut, NodeRef};
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

pub const MATCH_ID_ATTR: &str = "data-match-id";
pub const CARD_CLASS: &str = "match-card";

/// Holders of a scheduled kickoff each name a match.
static START_MARKED: LazyLock<Selector> = LazyLock::new(|| selector("[data-start]"));
static CARDS: LazyLock<Selector> = LazyLock::new(|| selector(".match-card"));
static HOME_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".matchname.left"));
static AWAY_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".matchname.right"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector(".matchTime .stsrt"));
static INFO: LazyLock<Selector> = LazyLock::new(|| selector(".info ul"));
static HOME_LOGO: LazyLock<Selector> = LazyLock::new(|| selector(".matchlogo.left img"));
static AWAY_LOGO: LazyLock<Selector> = LazyLock::new(|| selector(".matchlogo.right img"));
static HOME_SCORERS: LazyLock<Selector> = LazyLock::new(|| selector(".scorers.left"));
static AWAY_SCORERS: LazyLock<Selector> = LazyLock::new(|| selector(".scorers.right"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".boxstitle strong"));
static STATUS_SLOT: LazyLock<Selector> = LazyLock::new(|| selector("#score-status"));

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("built-in selector must parse")
}

// ---------------------------------------------------------------------------
// Render targets
// ---------------------------------------------------------------------------

/// Nodes belonging to one match. Resolved on every render since the page can
/// change between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub container: NodeId,
    pub home_name: Option<NodeId>,
    pub away_name: Option<NodeId>,
    pub time: Option<NodeId>,
    pub info: Option<NodeId>,
    pub home_logo: Option<NodeId>,
    pub away_logo: Option<NodeId>,
    pub home_scorers: Option<NodeId>,
    pub away_scorers: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnknownMatch(String),
    MissingElement { id: String, element: &'static str },
    Unwritable { id: String, element: &'static str },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownMatch(id) => write!(f, "no container for match {id}"),
            RenderError::MissingElement { id, element } => {
                write!(f, "match {id} is missing its {element} element")
            }
            RenderError::Unwritable { id, element } => {
                write!(f, "could not update the {element} element of match {id}")
            }
        }
    }
}

impl std::error::Error for RenderError {}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

pub struct Page {
    html: Html,
}

impl Page {
    pub fn parse(markup: &str) -> Self {
        Self { html: Html::parse_document(markup) }
    }

    pub fn to_html(&self) -> String {
        self.html.html()
    }

    /// Match ids in document order, first from elements carrying the kickoff
    /// marker, then from cards naming a match the marker scan missed.
    pub fn discover_match_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        let marked = self.html.select(&START_MARKED).filter_map(marker_id);
        let carded = self
            .html
            .select(&CARDS)
            .filter_map(|card| non_blank(card.value().attr(MATCH_ID_ATTR)));

        for id in marked.chain(carded) {
            if seen.insert(id) {
                ids.push(id.to_owned());
            }
        }
        ids
    }

    pub fn target(&self, id: &str) -> Option<RenderTarget> {
        let container = self.container(id)?;
        let scope = container
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(is_card)
            .unwrap_or(container);
        let first = |sel: &Selector| scope.select(sel).next().map(|el| el.id());

        Some(RenderTarget {
            container: container.id(),
            home_name: first(&HOME_NAME),
            away_name: first(&AWAY_NAME),
            time: first(&TIME),
            info: first(&INFO),
            home_logo: first(&HOME_LOGO),
            away_logo: first(&AWAY_LOGO),
            home_scorers: first(&HOME_SCORERS),
            away_scorers: first(&AWAY_SCORERS),
        })
    }

    pub fn title(&self) -> Option<NodeId> {
        self.html.select(&TITLE).next().map(|el| el.id())
    }

    pub fn status_slot(&self) -> Option<NodeId> {
        self.html.select(&STATUS_SLOT).next().map(|el| el.id())
    }

    fn container(&self, id: &str) -> Option<ElementRef<'_>> {
        let elements = || self.html.root_element().descendants().filter_map(ElementRef::wrap);
        elements()
            .find(|el| el.value().id() == Some(id))
            .or_else(|| elements().find(|el| el.value().attr(MATCH_ID_ATTR) == Some(id)))
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn text(&self, node: NodeId) -> String {
        self.element(node)
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.element(node).map(|el| el.inner_html()).unwrap_or_default()
    }

    /// Text with runs of whitespace collapsed, as a browser would display it.
    pub fn display_text(&self, node: NodeId) -> String {
        self.text(node).split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.value().attr(name).map(str::to_owned)
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node)
            .is_some_and(|el| el.value().classes().any(|c| c == class))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Replace the children of `node` with the parsed `markup`.
    pub fn set_inner_html(&mut self, node: NodeId, markup: &str) {
        let fragment = Html::parse_fragment(markup);
        let Some(mut target) = self.html.tree.get_mut(node) else {
            return;
        };
        while let Some(mut child) = target.first_child() {
            child.detach();
        }
        for child in fragment.root_element().children() {
            graft(&mut target, child);
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.set_inner_html(node, &escape_text(text));
    }

    /// Set (or add) attributes on an element, keeping the others in place.
    pub fn set_attrs(&mut self, node: NodeId, updates: &[(&str, &str)]) -> bool {
        let Some(el) = self.element(node) else {
            return false;
        };
        let mut attrs: Vec<(String, String)> = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        for (key, value) in updates {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = (*value).to_owned(),
                None => attrs.push(((*key).to_owned(), (*value).to_owned())),
            }
        }
        self.replace_element(node, &attrs)
    }

    /// Drop `remove` and add `add` to the element's class list.
    pub fn set_classes(&mut self, node: NodeId, remove: &[&str], add: &[&str]) -> bool {
        let Some(el) = self.element(node) else {
            return false;
        };
        let mut classes: Vec<&str> = el
            .value()
            .classes()
            .filter(|c| !remove.contains(c) && !add.contains(c))
            .collect();
        classes.extend_from_slice(add);
        let joined = classes.join(" ");
        self.set_attrs(node, &[("class", joined.as_str())])
    }

    /// Swap the element value at `node` for one with the given attributes.
    /// Children stay attached to the node. A fresh `Element` is built so its
    /// cached id/class lookups match the new attributes.
    fn replace_element(&mut self, node: NodeId, attrs: &[(String, String)]) -> bool {
        let Some(el) = self.element(node) else {
            return false;
        };
        let name = el.value().name.clone();
        let attrs = attrs
            .iter()
            .map(|(key, value)| Attribute {
                name: el
                    .value()
                    .attrs
                    .iter()
                    .map(|(qual, _)| qual)
                    .find(|qual| &*qual.local == key.as_str())
                    .cloned()
                    .unwrap_or_else(|| QualName::new(None, Namespace::from(""), LocalName::from(key.as_str()))),
                value: StrTendril::from(value.as_str()),
            })
            .collect();
        let replacement = Element::new(name, attrs);

        match self.html.tree.get_mut(node) {
            Some(mut slot) => {
                *slot.value() = Node::Element(replacement);
                true
            }
            None => false,
        }
    }
}

fn graft(parent: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    let mut copy = parent.append(source.value().clone());
    for child in source.children() {
        graft(&mut copy, child);
    }
}

fn is_card(el: &ElementRef<'_>) -> bool {
    el.value().classes().any(|c| c == CARD_CLASS)
}

fn marker_id(el: ElementRef<'_>) -> Option<&str> {
    non_blank(el.value().attr(MATCH_ID_ATTR)).or_else(|| non_blank(el.value().id()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn escape_text(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
