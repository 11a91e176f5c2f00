//! Browser-facing surface. A thin `#[wasm_bindgen]` wrapper over the
//! `Simulator`: the terminal UI feeds lines to `exec`, renders the returned
//! text, and reacts to `\x1b[...]` markers for the editor and exec-shell
//! handoffs. Everything below this file is plain Rust.

use crate::complete;
use crate::dispatch::{CommandOutcome, EditTarget, Simulator};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct System {
    sim: Simulator,
    pending_editor: Option<EditTarget>,
    editor_title: String,
    editor_content: String,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl System {
    #[wasm_bindgen(constructor)]
    pub fn new() -> System {
        web_sys::console::log_1(&JsValue::from_str("kubelab: session started"));
        System {
            sim: Simulator::new(),
            pending_editor: None,
            editor_title: String::new(),
            editor_content: String::new(),
        }
    }

    #[wasm_bindgen]
    pub fn prompt(&self) -> String {
        self.sim.prompt()
    }

    /// Run one input line. Plain output comes back as text; an editor
    /// handoff returns `\x1b[EDITOR]` (fetch the buffer via `editor_title`
    /// and `editor_content`), and entering an interactive pod shell returns
    /// `\x1b[EXEC:<pod>]`.
    #[wasm_bindgen]
    pub fn exec(&mut self, line: &str) -> String {
        match self.sim.execute(line) {
            CommandOutcome::Text(out) => out,
            CommandOutcome::Editor(req) => {
                self.editor_title = req.title;
                self.editor_content = req.content;
                self.pending_editor = Some(req.target);
                "\x1b[EDITOR]".to_string()
            }
            CommandOutcome::ExecMode { pod, .. } => format!("\x1b[EXEC:{}]", pod),
        }
    }

    #[wasm_bindgen]
    pub fn is_in_exec_mode(&self) -> bool {
        self.sim.exec_session.is_some()
    }

    #[wasm_bindgen]
    pub fn is_in_editor(&self) -> bool {
        self.pending_editor.is_some()
    }

    #[wasm_bindgen]
    pub fn editor_title(&self) -> String {
        self.editor_title.clone()
    }

    #[wasm_bindgen]
    pub fn editor_content(&self) -> String {
        self.editor_content.clone()
    }

    /// Commit the editor buffer and leave editor mode. Returns the message
    /// to print in the terminal.
    #[wasm_bindgen]
    pub fn editor_save(&mut self, buffer: &str) -> String {
        let target = match self.pending_editor.take() {
            Some(t) => t,
            None => return String::new(),
        };
        self.editor_title.clear();
        self.editor_content.clear();
        self.sim.editor_save(&target, buffer)
    }

    #[wasm_bindgen]
    pub fn editor_cancel(&mut self) -> String {
        self.pending_editor = None;
        self.editor_title.clear();
        self.editor_content.clear();
        "Edit cancelled, no changes made.".to_string()
    }

    /// Tab completion: the replacement for the whole input line. Equal to
    /// the input when nothing extends it.
    #[wasm_bindgen]
    pub fn complete_line(&self, partial: &str) -> String {
        complete::complete(partial, &self.sim.state, &self.sim.vfs).line
    }

    /// Candidates to list when the prefix is ambiguous.
    #[wasm_bindgen]
    pub fn complete(&self, partial: &str) -> js_sys::Array {
        complete::complete(partial, &self.sim.state, &self.sim.vfs)
            .suggestions
            .iter()
            .map(|s| JsValue::from_str(s))
            .collect()
    }

    #[wasm_bindgen]
    pub fn history(&self) -> js_sys::Array {
        self.sim
            .history
            .iter()
            .map(|s| JsValue::from_str(s))
            .collect()
    }

    /// Serialize the whole session (cluster, filesystem, helm registry,
    /// service table) so the page can stash it in browser storage.
    #[wasm_bindgen]
    pub fn save_state(&self) -> String {
        match serde_json::to_string(&self.sim) {
            Ok(s) => {
                web_sys::console::log_1(&JsValue::from_str("kubelab: session saved"));
                s
            }
            Err(e) => {
                web_sys::console::error_1(&JsValue::from_str(&format!(
                    "kubelab: save failed: {}",
                    e
                )));
                String::new()
            }
        }
    }

    #[wasm_bindgen]
    pub fn load_state(&mut self, snapshot: &str) -> bool {
        match serde_json::from_str::<Simulator>(snapshot) {
            Ok(sim) => {
                self.sim = sim;
                self.pending_editor = None;
                self.editor_title.clear();
                self.editor_content.clear();
                web_sys::console::log_1(&JsValue::from_str("kubelab: session restored"));
                true
            }
            Err(e) => {
                web_sys::console::error_1(&JsValue::from_str(&format!(
                    "kubelab: restore failed: {}",
                    e
                )));
                false
            }
        }
    }
}
