//! First-run defaults served before any cache or remote data exists.

use crate::document::HouseholdDocument;
use crate::model::{BlockId, DisplayKind, Person, Role, TaskTemplate};

/// Starter household: one parent and two children, so every view has someone
/// to render before the family edits anything.
pub fn seed_users() -> Vec<Person> {
    vec![
        Person {
            id: "u_papa".into(),
            name: "Papa".into(),
            role: Role::Parent,
            avatar: "/avatars/papa.png".into(),
            pin: None,
        },
        Person {
            id: "u_leon".into(),
            name: "Leon".into(),
            role: Role::Child,
            avatar: "/avatars/leon.png".into(),
            pin: None,
        },
        Person {
            id: "u_lina".into(),
            name: "Lina".into(),
            role: Role::Child,
            avatar: "/avatars/lina.png".into(),
            pin: None,
        },
    ]
}

/// Starter template catalog for the task library panel.
pub fn seed_library() -> Vec<TaskTemplate> {
    fn image(id: &str, title: &str, url: &str, blocks: &[BlockId], minutes: u32, category: &str) -> TaskTemplate {
        TaskTemplate {
            id: id.into(),
            title: title.into(),
            kind: DisplayKind::Image,
            image_url: Some(url.into()),
            default_blocks: blocks.iter().copied().collect(),
            default_duration: minutes,
            category: category.into(),
        }
    }

    vec![
        image(
            "lib_brush",
            "Brush teeth",
            "/pictos/brush-teeth.png",
            &[BlockId::Pre, BlockId::Post],
            1,
            "Self care",
        ),
        TaskTemplate {
            id: "lib_breakfast".into(),
            title: "Breakfast".into(),
            kind: DisplayKind::Text,
            image_url: None,
            default_blocks: [BlockId::Pre].into_iter().collect(),
            default_duration: 0,
            category: "Food".into(),
        },
        image(
            "lib_bath",
            "Take a bath",
            "/pictos/bath.png",
            &[BlockId::Post],
            10,
            "Self care",
        ),
        image(
            "lib_read",
            "Reading",
            "/pictos/reading.png",
            &[BlockId::Post],
            15,
            "Quiet time",
        ),
        image(
            "lib_sleep",
            "Sleep",
            "/pictos/sleep.png",
            &[BlockId::Post],
            0,
            "Quiet time",
        ),
    ]
}

/// Full first-run document: seed people and library, every mutable collection
/// empty.
pub fn seed_document() -> HouseholdDocument {
    HouseholdDocument {
        users: seed_users(),
        library: seed_library(),
        ..Default::default()
    }
}
