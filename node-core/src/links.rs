//! Physical link catalog and the capability descriptor describing which links a
//! build supports.
//!
//! The wireless stack addresses links through a bit mask. [`LinkType`] names the
//! three physical links, [`LinkMask`] carries the raw selection handed to the
//! stack, and [`LinkSet`] answers which links the hardware can actually run so
//! the cyclic switch skips anything missing.

use core::fmt;

/// Physical link technologies in switch precedence order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkType {
    /// Short-range link used for registration and on-demand connections.
    Ble,
    /// Sub-GHz frequency shift keying link.
    Fsk,
    /// Sub-GHz chirp spread spectrum link.
    Css,
}

impl LinkType {
    /// Every link in cyclic switch order.
    pub const ALL: [LinkType; 3] = [LinkType::Ble, LinkType::Fsk, LinkType::Css];

    /// Returns the single-bit mask addressing this link.
    #[must_use]
    pub const fn mask(self) -> LinkMask {
        match self {
            LinkType::Ble => LinkMask::LINK_1,
            LinkType::Fsk => LinkMask::LINK_2,
            LinkType::Css => LinkMask::LINK_3,
        }
    }

    /// Returns `true` for the short-range link, which needs an explicit
    /// connection before uplinks flow.
    #[must_use]
    pub const fn is_short_range(self) -> bool {
        matches!(self, LinkType::Ble)
    }

    /// Lower-case label used by logs and the console.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            LinkType::Ble => "ble",
            LinkType::Fsk => "fsk",
            LinkType::Css => "css",
        }
    }

    /// Parses a console label (case-insensitive).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|link| link.label().eq_ignore_ascii_case(label))
    }

    const fn index(self) -> usize {
        match self {
            LinkType::Ble => 0,
            LinkType::Fsk => 1,
            LinkType::Css => 2,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw link selection handed to the wireless stack.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkMask(u32);

impl LinkMask {
    /// No link selected. A null stack handle always pairs with this mask.
    pub const NONE: LinkMask = LinkMask(0);
    /// Short-range link bit.
    pub const LINK_1: LinkMask = LinkMask(1 << 0);
    /// Sub-GHz FSK link bit.
    pub const LINK_2: LinkMask = LinkMask(1 << 1);
    /// Sub-GHz CSS link bit.
    pub const LINK_3: LinkMask = LinkMask(1 << 2);
    /// Let the stack pick any started link.
    pub const ANY: LinkMask = LinkMask(0b111);

    /// Wraps raw mask bits, discarding unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ANY.0)
    }

    /// Returns the raw mask bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, link: LinkType) -> bool {
        self.0 & link.mask().0 != 0
    }

    #[must_use]
    pub const fn union(self, other: LinkMask) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the highest-precedence link present in the mask.
    #[must_use]
    pub fn primary(self) -> Option<LinkType> {
        LinkType::ALL.into_iter().find(|link| self.contains(*link))
    }
}

impl From<LinkType> for LinkMask {
    fn from(link: LinkType) -> Self {
        link.mask()
    }
}

impl fmt::Display for LinkMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }

        let mut first = true;
        for link in LinkType::ALL {
            if self.contains(link) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(link.label())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Links the hardware build can run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkSet {
    mask: LinkMask,
}

impl LinkSet {
    /// Every link available (reference hardware with the sub-GHz radio fitted).
    pub const ALL: LinkSet = LinkSet {
        mask: LinkMask::ANY,
    };

    /// Creates an empty set; chain [`LinkSet::with`] to populate it.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            mask: LinkMask::NONE,
        }
    }

    /// Returns a copy of the set with `link` added.
    #[must_use]
    pub const fn with(self, link: LinkType) -> Self {
        Self {
            mask: self.mask.union(link.mask()),
        }
    }

    /// Builds a set holding a single link.
    #[must_use]
    pub const fn only(link: LinkType) -> Self {
        Self::empty().with(link)
    }

    #[must_use]
    pub const fn contains(self, link: LinkType) -> bool {
        self.mask.contains(link)
    }

    #[must_use]
    pub const fn mask(self) -> LinkMask {
        self.mask
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.mask.is_empty()
    }

    /// Iterates the available links in switch precedence order.
    pub fn iter(self) -> impl Iterator<Item = LinkType> {
        LinkType::ALL
            .into_iter()
            .filter(move |link| self.contains(*link))
    }

    /// Picks the link that follows `current` in the cyclic order
    /// BLE → FSK → CSS → BLE, skipping links outside the set.
    ///
    /// A single-link set hands back that same link. `None` only when the set is
    /// empty. When `current` is not a link at all the first available link wins.
    #[must_use]
    pub fn next_after(self, current: Option<LinkType>) -> Option<LinkType> {
        let Some(current) = current else {
            return self.iter().next();
        };

        let start = current.index();
        (1..=LinkType::ALL.len())
            .map(|offset| LinkType::ALL[(start + offset) % LinkType::ALL.len()])
            .find(|candidate| self.contains(*candidate))
    }
}

impl Default for LinkSet {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_follow_link_bits() {
        assert_eq!(LinkType::Ble.mask().bits(), 1);
        assert_eq!(LinkType::Fsk.mask().bits(), 2);
        assert_eq!(LinkType::Css.mask().bits(), 4);
        assert_eq!(LinkMask::from_bits(0xff), LinkMask::ANY);
    }

    #[test]
    fn next_after_cycles_through_all_links() {
        let set = LinkSet::ALL;
        assert_eq!(set.next_after(Some(LinkType::Ble)), Some(LinkType::Fsk));
        assert_eq!(set.next_after(Some(LinkType::Fsk)), Some(LinkType::Css));
        assert_eq!(set.next_after(Some(LinkType::Css)), Some(LinkType::Ble));
    }

    #[test]
    fn next_after_skips_missing_links() {
        let set = LinkSet::only(LinkType::Ble).with(LinkType::Css);
        assert_eq!(set.next_after(Some(LinkType::Ble)), Some(LinkType::Css));
        assert_eq!(set.next_after(Some(LinkType::Css)), Some(LinkType::Ble));
        assert_eq!(set.next_after(Some(LinkType::Fsk)), Some(LinkType::Css));
    }

    #[test]
    fn single_link_set_returns_same_link() {
        let set = LinkSet::only(LinkType::Fsk);
        assert_eq!(set.next_after(Some(LinkType::Fsk)), Some(LinkType::Fsk));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn missing_current_picks_first_available() {
        let set = LinkSet::only(LinkType::Css).with(LinkType::Fsk);
        assert_eq!(set.next_after(None), Some(LinkType::Fsk));
        assert_eq!(LinkSet::empty().next_after(None), None);
    }

    #[test]
    fn primary_prefers_short_range() {
        assert_eq!(LinkMask::ANY.primary(), Some(LinkType::Ble));
        assert_eq!(LinkMask::LINK_3.primary(), Some(LinkType::Css));
        assert_eq!(LinkMask::NONE.primary(), None);
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(LinkType::from_label("FSK"), Some(LinkType::Fsk));
        assert_eq!(LinkType::from_label("lora"), None);
    }
}
