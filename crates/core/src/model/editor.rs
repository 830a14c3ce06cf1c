use crate::model::project::{EditorLanguage, ProjectType};

/// The learner's code, one buffer per editor language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffers {
    html: String,
    css: String,
    javascript: String,
    python: String,
    active: EditorLanguage,
}

impl EditorBuffers {
    /// Empty buffers with the stack's default language selected.
    #[must_use]
    pub fn empty(project_type: ProjectType) -> Self {
        Self {
            html: String::new(),
            css: String::new(),
            javascript: String::new(),
            python: String::new(),
            active: project_type.initial_language(),
        }
    }

    #[must_use]
    pub fn active(&self) -> EditorLanguage {
        self.active
    }

    #[must_use]
    pub fn get(&self, language: EditorLanguage) -> &str {
        match language {
            EditorLanguage::Html => &self.html,
            EditorLanguage::Css => &self.css,
            EditorLanguage::Javascript => &self.javascript,
            EditorLanguage::Python => &self.python,
        }
    }

    /// Code in the currently selected buffer.
    #[must_use]
    pub fn current_code(&self) -> &str {
        self.get(self.active)
    }

    /// Replace a buffer and make it the active one.
    pub fn set(&mut self, language: EditorLanguage, code: impl Into<String>) {
        let code = code.into();
        match language {
            EditorLanguage::Html => self.html = code,
            EditorLanguage::Css => self.css = code,
            EditorLanguage::Javascript => self.javascript = code,
            EditorLanguage::Python => self.python = code,
        }
        self.active = language;
    }

    pub fn select(&mut self, language: EditorLanguage) {
        self.active = language;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
            && self.css.is_empty()
            && self.javascript.is_empty()
            && self.python.is_empty()
    }

    /// Load suggested code into the buffer it belongs to.
    pub fn load_starter(&mut self, project_type: ProjectType, code: &str) {
        self.set(starter_language(project_type, code), code);
    }
}

/// Pick the buffer for a snippet of suggested code.
///
/// Web projects are routed by content: markup goes to HTML, anything that
/// looks like a stylesheet goes to CSS and the rest is treated as script.
#[must_use]
pub fn starter_language(project_type: ProjectType, code: &str) -> EditorLanguage {
    match project_type {
        ProjectType::PythonStreamlit => EditorLanguage::Python,
        ProjectType::HtmlCssJs => {
            if code.contains("<html") {
                EditorLanguage::Html
            } else if code.contains("style") && code.contains('{') {
                EditorLanguage::Css
            } else {
                EditorLanguage::Javascript
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_code_is_routed_by_content() {
        let web = ProjectType::HtmlCssJs;
        assert_eq!(starter_language(web, "<html><body></body></html>"), EditorLanguage::Html);
        assert_eq!(
            starter_language(web, "/* style */ body { color: red; }"),
            EditorLanguage::Css
        );
        assert_eq!(starter_language(web, "console.log(1);"), EditorLanguage::Javascript);
        assert_eq!(
            starter_language(ProjectType::PythonStreamlit, "<html>"),
            EditorLanguage::Python
        );
    }

    #[test]
    fn set_switches_active_buffer() {
        let mut buffers = EditorBuffers::empty(ProjectType::HtmlCssJs);
        assert_eq!(buffers.active(), EditorLanguage::Html);
        buffers.set(EditorLanguage::Css, "p { margin: 0 }");
        assert_eq!(buffers.active(), EditorLanguage::Css);
        assert_eq!(buffers.current_code(), "p { margin: 0 }");
        assert_eq!(buffers.get(EditorLanguage::Html), "");
    }

    #[test]
    fn load_starter_fills_matching_buffer() {
        let mut buffers = EditorBuffers::empty(ProjectType::HtmlCssJs);
        buffers.load_starter(ProjectType::HtmlCssJs, "<html><h1>Hi</h1></html>");
        assert_eq!(buffers.get(EditorLanguage::Html), "<html><h1>Hi</h1></html>");
        assert!(!buffers.is_empty());
    }
}
