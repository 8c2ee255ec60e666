use super::*;

fn descriptor(position: usize, is_restartable: bool) -> TabDescriptor {
    TabDescriptor {
        index: TabIndex(position),
        label: format!("service-{position}"),
        icon_url: format!("/icons/{position}.svg"),
        iframe_url: format!("http://service-{position}.internal"),
        is_restartable,
        accent_color: Some("#336699".to_string()),
    }
}

fn loaded(tabs: Vec<TabDescriptor>) -> ConfigLoadState {
    ConfigLoadState::Loaded(tabs.into())
}

#[test]
fn loading_state_renders_loading() {
    assert_eq!(
        present(&ConfigLoadState::Loading, &StatusSnapshot::new()),
        RenderMode::Loading
    );
}

#[test]
fn failed_load_renders_error_with_retry() {
    let state = ConfigLoadState::Failed(ConfigError::Unauthorized("token expired".to_string()));
    assert_eq!(
        present(&state, &StatusSnapshot::new()),
        RenderMode::Error {
            message: "token expired".to_string(),
            requires_reauth: true,
            retry: UiAction::RetryConfigLoad,
        }
    );
}

#[test]
fn zero_tabs_render_empty_not_error_or_populated() {
    let mode = present(&loaded(Vec::new()), &StatusSnapshot::new());
    assert_eq!(mode, RenderMode::Empty);
    assert_eq!(mode.name(), "empty");
}

#[test]
fn populated_views_reflect_store_status_and_restartability() {
    let state = loaded(vec![descriptor(0, true), descriptor(1, false), descriptor(2, true)]);
    let statuses: StatusSnapshot = [
        (TabIndex(0), TabStatus::Running),
        (TabIndex(1), TabStatus::Error),
        (TabIndex(2), TabStatus::Restarting),
    ]
    .into_iter()
    .collect();

    let RenderMode::Populated(views) = present(&state, &statuses) else {
        panic!("expected populated mode");
    };

    let summary: Vec<_> = views
        .iter()
        .map(|view| (view.descriptor.index, view.status, view.restart))
        .collect();
    assert_eq!(
        summary,
        vec![
            (
                TabIndex(0),
                TabStatus::Running,
                Some(RestartControl {
                    action: UiAction::Restart(TabIndex(0)),
                    enabled: true
                })
            ),
            (TabIndex(1), TabStatus::Error, None),
            (
                TabIndex(2),
                TabStatus::Restarting,
                Some(RestartControl {
                    action: UiAction::Restart(TabIndex(2)),
                    enabled: false
                })
            ),
        ]
    );
}

#[test]
fn status_changes_never_switch_the_mode() {
    let state = loaded(vec![descriptor(0, true)]);
    for status in [TabStatus::Running, TabStatus::Restarting, TabStatus::Error] {
        let statuses: StatusSnapshot = [(TabIndex(0), status)].into_iter().collect();
        assert_eq!(present(&state, &statuses).name(), "populated");
    }
    assert_eq!(
        present(&ConfigLoadState::Loading, &[(TabIndex(0), TabStatus::Error)].into_iter().collect())
            .name(),
        "loading"
    );
}
