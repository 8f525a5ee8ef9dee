//! Page-link strip for list views.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLink {
    Button {
        text: String,
        href: String,
        is_active: bool,
    },
    Separator,
}

impl PageLink {
    fn button(text: impl Into<String>, page: i64, is_active: bool) -> Self {
        PageLink::Button {
            text: text.into(),
            href: format!("?page={page}"),
            is_active,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, PageLink::Separator)
    }

    pub fn text(&self) -> &str {
        match self {
            PageLink::Button { text, .. } => text,
            PageLink::Separator => "…",
        }
    }

    pub fn href(&self) -> &str {
        match self {
            PageLink::Button { href, .. } => href,
            PageLink::Separator => "",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PageLink::Button { is_active: true, .. })
    }
}

/// Builds the links around `current` for `total_items`. Returns an empty
/// strip when everything fits on one page.
pub fn make_paginator(current: i64, total_items: i64, per_page: i64) -> Vec<PageLink> {
    let per_page = per_page.max(1);
    let total_pages = ((total_items + per_page - 1) / per_page).max(1);
    let current = current.clamp(1, total_pages);

    if total_pages == 1 {
        return Vec::new();
    }

    let start = (current - 3).max(1);
    let end = (start + 6).min(total_pages);
    let mut links = Vec::new();

    if current > 1 {
        links.push(PageLink::button("Prev", current - 1, false));
    }
    if start > 1 {
        links.push(PageLink::button("1", 1, false));
    }
    if start > 2 {
        links.push(PageLink::Separator);
    }
    for n in start..=end {
        links.push(PageLink::button(n.to_string(), n, n == current));
    }
    if end < total_pages - 1 {
        links.push(PageLink::Separator);
    }
    if end < total_pages {
        links.push(PageLink::button(total_pages.to_string(), total_pages, false));
    }
    if current < total_pages {
        links.push(PageLink::button("Next", current + 1, false));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(links: &[PageLink]) -> Vec<String> {
        links
            .iter()
            .map(|l| match l {
                PageLink::Button { text, .. } => text.clone(),
                PageLink::Separator => "...".into(),
            })
            .collect()
    }

    #[test]
    fn single_page_needs_no_links() {
        assert!(make_paginator(1, 0, 10).is_empty());
        assert!(make_paginator(1, 10, 10).is_empty());
    }

    #[test]
    fn first_page_of_many() {
        let links = make_paginator(1, 200, 10);
        assert_eq!(texts(&links), ["1", "2", "3", "4", "5", "6", "7", "...", "20", "Next"]);
        assert_eq!(
            links[0],
            PageLink::Button {
                text: "1".into(),
                href: "?page=1".into(),
                is_active: true
            }
        );
    }

    #[test]
    fn middle_page_shows_both_ends() {
        let links = make_paginator(10, 200, 10);
        assert_eq!(
            texts(&links),
            ["Prev", "1", "...", "7", "8", "9", "10", "11", "12", "13", "...", "20", "Next"]
        );
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let links = make_paginator(99, 25, 10);
        assert_eq!(texts(&links), ["Prev", "1", "2", "3"]);
    }
}
