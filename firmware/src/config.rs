//! Build-time node configuration.
//!
//! The link set and external-radio presence come from cargo features so one
//! source tree covers every board variant.

use node_core::config::NodeConfig;
use node_core::links::{LinkSet, LinkType};

use crate::buttons::ButtonLayout;

#[cfg(not(any(feature = "link-ble", feature = "link-fsk", feature = "link-css")))]
compile_error!("enable at least one of `link-ble`, `link-fsk`, `link-css`");

/// Links compiled into this image.
pub const AVAILABLE_LINKS: LinkSet = available_links();

#[cfg(feature = "dual-button")]
pub const BUTTON_LAYOUT: ButtonLayout = ButtonLayout::Dual;
#[cfg(not(feature = "dual-button"))]
pub const BUTTON_LAYOUT: ButtonLayout = ButtonLayout::Single;

const fn available_links() -> LinkSet {
    let mut links = LinkSet::empty();
    if cfg!(feature = "link-ble") {
        links = links.with(LinkType::Ble);
    }
    if cfg!(feature = "link-fsk") {
        links = links.with(LinkType::Fsk);
    }
    if cfg!(feature = "link-css") {
        links = links.with(LinkType::Css);
    }
    links
}

/// Registration goes over the short-range link when it is built in, otherwise
/// over the first sub-GHz link.
const fn preferred_link(links: LinkSet) -> LinkType {
    if links.contains(LinkType::Ble) {
        LinkType::Ble
    } else if links.contains(LinkType::Fsk) {
        LinkType::Fsk
    } else {
        LinkType::Css
    }
}

/// Configuration the node runs with.
pub const fn node_config() -> NodeConfig {
    let link = preferred_link(AVAILABLE_LINKS);
    NodeConfig::new()
        .with_links(AVAILABLE_LINKS)
        .with_registration_link(link)
        .with_default_link(link)
        .with_external_radio(cfg!(feature = "radio-external"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_link_favours_short_range() {
        assert_eq!(preferred_link(LinkSet::ALL), LinkType::Ble);
        assert_eq!(
            preferred_link(LinkSet::only(LinkType::Css).with(LinkType::Fsk)),
            LinkType::Fsk
        );
        assert_eq!(preferred_link(LinkSet::only(LinkType::Css)), LinkType::Css);
    }

    #[test]
    fn config_only_uses_built_links() {
        let config = node_config();
        assert_eq!(config.available, AVAILABLE_LINKS);
        assert!(AVAILABLE_LINKS.contains(config.registration_link));
        assert!(AVAILABLE_LINKS.contains(config.default_link));
    }
}
