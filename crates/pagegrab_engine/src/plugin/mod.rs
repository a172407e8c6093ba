//! Plugin registry.
//!
//! Plugins are kept in registration order. Registering a name that already
//! exists replaces it in place. After every change the registry rebuilds its
//! typed hook lists, the de-duplicated action list and the merged theme, so
//! dispatch never has to look at the plugin list again.

pub mod actions;
pub mod hooks;

use crate::snapshot::EngineSnapshot;
use actions::{ActionSurface, PluginAction};
use hooks::{CopyResultHook, CopyTransformHook, ElementSelectHook, LifecycleHook, SelectDecision};
use pagegrab_core::{ElementInfo, GrabError, Point};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name the engine registers its own actions under.
pub const BUILTIN_PLUGIN: &str = "pagegrab.builtin";

/// Visual switches a renderer reads from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Theme {
    pub enabled: bool,
    pub hue: f32,
    pub selection_box: bool,
    pub drag_box: bool,
    pub grabbed_boxes: bool,
    pub element_label: bool,
    pub toolbar: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            enabled: true,
            hue: 0.0,
            selection_box: true,
            drag_box: true,
            grabbed_boxes: true,
            element_label: true,
            toolbar: true,
        }
    }
}

/// Partial theme contributed by a plugin; `None` leaves the value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeOverrides {
    pub enabled: Option<bool>,
    pub hue: Option<f32>,
    pub selection_box: Option<bool>,
    pub drag_box: Option<bool>,
    pub grabbed_boxes: Option<bool>,
    pub element_label: Option<bool>,
    pub toolbar: Option<bool>,
}

impl Theme {
    fn apply(&mut self, overrides: &ThemeOverrides) {
        if let Some(value) = overrides.enabled {
            self.enabled = value;
        }
        if let Some(value) = overrides.hue {
            self.hue = value;
        }
        if let Some(value) = overrides.selection_box {
            self.selection_box = value;
        }
        if let Some(value) = overrides.drag_box {
            self.drag_box = value;
        }
        if let Some(value) = overrides.grabbed_boxes {
            self.grabbed_boxes = value;
        }
        if let Some(value) = overrides.element_label {
            self.element_label = value;
        }
        if let Some(value) = overrides.toolbar {
            self.toolbar = value;
        }
    }
}

#[derive(Clone, Default)]
pub struct PluginHooks {
    pub lifecycle: Option<Arc<dyn LifecycleHook>>,
    pub element_select: Option<Arc<dyn ElementSelectHook>>,
    pub copy_transform: Option<Arc<dyn CopyTransformHook>>,
    pub copy_result: Option<Arc<dyn CopyResultHook>>,
}

#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub hooks: PluginHooks,
    pub actions: Vec<PluginAction>,
    pub theme: Option<ThemeOverrides>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: PluginHooks::default(),
            actions: Vec::new(),
            theme: None,
        }
    }

    pub fn with_lifecycle(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.lifecycle = Some(Arc::new(hook));
        self
    }

    pub fn with_element_select(mut self, hook: impl ElementSelectHook + 'static) -> Self {
        self.hooks.element_select = Some(Arc::new(hook));
        self
    }

    pub fn with_copy_transform(mut self, hook: impl CopyTransformHook + 'static) -> Self {
        self.hooks.copy_transform = Some(Arc::new(hook));
        self
    }

    pub fn with_copy_result(mut self, hook: impl CopyResultHook + 'static) -> Self {
        self.hooks.copy_result = Some(Arc::new(hook));
        self
    }

    pub fn with_action(mut self, action: PluginAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_theme(mut self, theme: ThemeOverrides) -> Self {
        self.theme = Some(theme);
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("theme", &self.theme)
            .finish_non_exhaustive()
    }
}

/// An element claimed by an element-select hook.
#[derive(Debug)]
pub struct Interception {
    pub plugin: String,
    pub result: Result<Option<String>, GrabError>,
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
    builtin: HashSet<String>,
    lifecycle: Vec<(String, Arc<dyn LifecycleHook>)>,
    element_select: Vec<(String, Arc<dyn ElementSelectHook>)>,
    copy_transform: Vec<(String, Arc<dyn CopyTransformHook>)>,
    copy_result: Vec<(String, Arc<dyn CopyResultHook>)>,
    actions: Vec<PluginAction>,
    theme: Theme,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a plugin. A replaced plugin keeps its position.
    ///
    /// # Returns
    /// The plugin previously registered under the same name, if any.
    pub fn register(&mut self, plugin: Plugin) -> Option<Plugin> {
        self.builtin.remove(&plugin.name);
        let previous = self.insert(plugin);
        self.rebuild();
        previous
    }

    /// Register an engine-provided plugin unless a user plugin already
    /// claimed the name.
    ///
    /// # Returns
    /// `false` when the name belongs to a user-registered plugin.
    pub fn register_builtin(&mut self, plugin: Plugin) -> bool {
        let taken_by_user = self
            .plugins
            .iter()
            .any(|existing| existing.name == plugin.name && !self.builtin.contains(&existing.name));
        if taken_by_user {
            debug!(target: "pagegrab_engine::plugin", plugin = %plugin.name, "builtin skipped; user plugin owns the name");
            return false;
        }
        self.builtin.insert(plugin.name.clone());
        self.insert(plugin);
        self.rebuild();
        true
    }

    fn insert(&mut self, plugin: Plugin) -> Option<Plugin> {
        match self.plugins.iter_mut().find(|existing| existing.name == plugin.name) {
            Some(slot) => Some(std::mem::replace(slot, plugin)),
            None => {
                self.plugins.push(plugin);
                None
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Plugin> {
        let index = self.plugins.iter().position(|plugin| plugin.name == name)?;
        let removed = self.plugins.remove(index);
        self.builtin.remove(name);
        self.rebuild();
        Some(removed)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.name.as_str()).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.name == name)
    }

    fn rebuild(&mut self) {
        self.lifecycle.clear();
        self.element_select.clear();
        self.copy_transform.clear();
        self.copy_result.clear();
        self.actions.clear();
        self.theme = Theme::default();

        for plugin in &self.plugins {
            let name = &plugin.name;
            if let Some(hook) = &plugin.hooks.lifecycle {
                self.lifecycle.push((name.clone(), Arc::clone(hook)));
            }
            if let Some(hook) = &plugin.hooks.element_select {
                self.element_select.push((name.clone(), Arc::clone(hook)));
            }
            if let Some(hook) = &plugin.hooks.copy_transform {
                self.copy_transform.push((name.clone(), Arc::clone(hook)));
            }
            if let Some(hook) = &plugin.hooks.copy_result {
                self.copy_result.push((name.clone(), Arc::clone(hook)));
            }
            for action in &plugin.actions {
                // Last registration wins but keeps the first position.
                match self.actions.iter_mut().find(|existing| existing.id == action.id) {
                    Some(slot) => *slot = action.clone(),
                    None => self.actions.push(action.clone()),
                }
            }
            if let Some(overrides) = &plugin.theme {
                self.theme.apply(overrides);
            }
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn actions(&self, surface: ActionSurface) -> impl Iterator<Item = &PluginAction> {
        self.actions
            .iter()
            .filter(move |action| action.surface.includes(surface))
    }

    pub fn action(&self, id: &str) -> Option<&PluginAction> {
        self.actions.iter().find(|action| action.id == id)
    }

    /// Call `f` on every lifecycle hook in registration order.
    pub fn for_each_lifecycle(&self, f: impl Fn(&dyn LifecycleHook)) {
        for (_, hook) in &self.lifecycle {
            f(hook.as_ref());
        }
    }

    pub fn notify_activate(&self) {
        self.for_each_lifecycle(|hook| hook.on_activate());
    }

    pub fn notify_deactivate(&self) {
        self.for_each_lifecycle(|hook| hook.on_deactivate());
    }

    pub fn notify_hover(&self, element: Option<&ElementInfo>) {
        self.for_each_lifecycle(|hook| hook.on_element_hover(element));
    }

    pub fn notify_drag_start(&self, origin: Point) {
        self.for_each_lifecycle(|hook| hook.on_drag_start(origin));
    }

    pub fn notify_drag_end(&self, elements: &[ElementInfo]) {
        self.for_each_lifecycle(|hook| hook.on_drag_end(elements));
    }

    pub fn notify_before_copy(&self, elements: &[ElementInfo]) {
        self.for_each_lifecycle(|hook| hook.on_before_copy(elements));
    }

    pub fn notify_after_copy(&self, elements: &[ElementInfo], success: bool) {
        self.for_each_lifecycle(|hook| hook.on_after_copy(elements, success));
    }

    pub fn notify_state_change(&self, snapshot: &EngineSnapshot) {
        self.for_each_lifecycle(|hook| hook.on_state_change(snapshot));
    }

    pub fn notify_prompt_mode(&self, is_prompt_mode: bool) {
        self.for_each_lifecycle(|hook| hook.on_prompt_mode_change(is_prompt_mode));
    }

    /// Offer an element to the element-select hooks; the first interception
    /// wins.
    pub fn intercept_element(&self, element: &ElementInfo) -> Option<Interception> {
        for (plugin, hook) in &self.element_select {
            if let SelectDecision::Intercept(result) = hook.on_element_select(element) {
                debug!(target: "pagegrab_engine::plugin", plugin = %plugin, element = %element.id, "element intercepted");
                return Some(Interception {
                    plugin: plugin.clone(),
                    result,
                });
            }
        }
        None
    }

    /// Run the copy transforms in order. A failing transform is skipped and
    /// the content it received passes through.
    pub fn transform_copy(&self, content: String, elements: &[ElementInfo]) -> String {
        let mut current = content;
        for (plugin, hook) in &self.copy_transform {
            match hook.transform(current.clone(), elements) {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(target: "pagegrab_engine::plugin", plugin = %plugin, error = %err, "copy transform failed");
                }
            }
        }
        current
    }

    pub fn notify_copy_success(&self, content: &str, elements: &[ElementInfo]) {
        for (_, hook) in &self.copy_result {
            hook.on_copy_success(content, elements);
        }
    }

    pub fn notify_copy_error(&self, message: &str) {
        for (_, hook) in &self.copy_result {
            hook.on_copy_error(message);
        }
    }
}
