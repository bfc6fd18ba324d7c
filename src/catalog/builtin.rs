//! Built-in case list

use std::path::PathBuf;

use super::{Case, Category};

/// (id, document, width, height)
type Entry = (&'static str, &'static str, u32, u32);

static BUILTINS: &[Entry] = &[
    ("new_tab", "crates/hiwave-app/src/ui/new_tab.html", 1280, 800),
    ("about", "crates/hiwave-app/src/ui/about.html", 800, 600),
    ("settings", "crates/hiwave-app/src/ui/settings.html", 1024, 768),
    ("chrome_rustkit", "crates/hiwave-app/src/ui/chrome.html", 1280, 100),
    ("shelf", "crates/hiwave-app/src/ui/shelf.html", 1280, 120),
];

static WEBSUITE: &[Entry] = &[
    ("article-typography", "websuite/cases/article-typography/index.html", 1280, 800),
    ("card-grid", "websuite/cases/card-grid/index.html", 1280, 800),
    ("css-selectors", "websuite/cases/css-selectors/index.html", 800, 1200),
    ("flex-positioning", "websuite/cases/flex-positioning/index.html", 800, 1000),
    ("form-elements", "websuite/cases/form-elements/index.html", 800, 600),
    ("gradient-backgrounds", "websuite/cases/gradient-backgrounds/index.html", 800, 600),
    ("image-gallery", "websuite/cases/image-gallery/index.html", 1280, 800),
    ("sticky-scroll", "websuite/cases/sticky-scroll/index.html", 1280, 800),
];

static MICRO: &[Entry] = &[
    ("backgrounds", "websuite/micro/backgrounds/index.html", 900, 1000),
    ("bg-solid", "websuite/micro/bg-solid/index.html", 800, 600),
    ("bg-pure", "websuite/micro/bg-pure/index.html", 800, 600),
    ("combinators", "websuite/micro/combinators/index.html", 800, 800),
    ("form-controls", "websuite/micro/form-controls/index.html", 800, 1200),
    ("gradients", "websuite/micro/gradients/index.html", 900, 1000),
    ("images-intrinsic", "websuite/micro/images-intrinsic/index.html", 800, 1400),
    ("pseudo-classes", "websuite/micro/pseudo-classes/index.html", 800, 800),
    ("rounded-corners", "websuite/micro/rounded-corners/index.html", 900, 1000),
    ("specificity", "websuite/micro/specificity/index.html", 800, 600),
];

pub(super) fn cases() -> Vec<Case> {
    let groups: [(&[Entry], Category); 3] = [
        (BUILTINS, Category::Builtins),
        (WEBSUITE, Category::Websuite),
        (MICRO, Category::Micro),
    ];

    groups
        .iter()
        .flat_map(|(entries, category)| {
            entries.iter().map(move |(id, doc, w, h)| Case {
                id: id.to_string(),
                document: PathBuf::from(doc),
                width: *w,
                height: *h,
                category: *category,
                threshold: None,
            })
        })
        .collect()
}
