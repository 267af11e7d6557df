#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum NodeAction {
    AttachFile,
    Disconnect,
    Delete,
}

pub(super) struct MenuItem {
    pub(super) action: NodeAction,
    pub(super) name: &'static str,
}

pub(super) fn source_menu_items() -> Vec<MenuItem> {
    vec![
        MenuItem {
            action: NodeAction::AttachFile,
            name: "Attach file...",
        },
        MenuItem {
            action: NodeAction::Disconnect,
            name: "Disconnect all",
        },
        MenuItem {
            action: NodeAction::Delete,
            name: "Delete node",
        },
    ]
}

pub(super) const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
