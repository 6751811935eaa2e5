//! Build recipes, one per supported language.

use std::path::Path;

use super::Language;

const PYTHON_DOCKERFILE: &str = r#"FROM python:3.10-slim
WORKDIR /app
COPY script.py .
USER nobody
CMD ["python", "-u", "script.py"]
"#;

const JAVASCRIPT_DOCKERFILE: &str = r#"FROM node:18-slim
WORKDIR /app
COPY script.js .
USER node
CMD ["node", "script.js"]
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecipe {
    pub language: Language,
    pub dockerfile: String,
}

impl ExecutionRecipe {
    pub fn new(language: Language, dockerfile: impl Into<String>) -> Self {
        Self {
            language,
            dockerfile: dockerfile.into(),
        }
    }

    pub fn builtin(language: Language) -> Self {
        let dockerfile = match language {
            Language::Python => PYTHON_DOCKERFILE,
            Language::JavaScript => JAVASCRIPT_DOCKERFILE,
        };
        Self::new(language, dockerfile)
    }

    pub fn script_filename(&self) -> &'static str {
        self.language.script_filename()
    }

    /// Path of the recipe inside the build context.
    pub fn dockerfile_path(&self) -> String {
        format!("dockerfiles/{}", Self::file_name(self.language))
    }

    fn file_name(language: Language) -> String {
        format!("Dockerfile.{}", language.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RecipeBook {
    javascript: ExecutionRecipe,
    python: ExecutionRecipe,
}

impl Default for RecipeBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RecipeBook {
    pub fn builtin() -> Self {
        Self {
            javascript: ExecutionRecipe::builtin(Language::JavaScript),
            python: ExecutionRecipe::builtin(Language::Python),
        }
    }

    /// Built-in recipes, replaced by any `Dockerfile.<language>` found in `dir`.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut book = Self::builtin();
        for language in Language::ALL {
            let path = dir.join(ExecutionRecipe::file_name(language));
            if path.is_file() {
                let dockerfile = std::fs::read_to_string(&path)?;
                log::info!("Using {} recipe from {}", language, path.display());
                book.insert(ExecutionRecipe::new(language, dockerfile));
            }
        }
        Ok(book)
    }

    pub fn insert(&mut self, recipe: ExecutionRecipe) {
        match recipe.language {
            Language::JavaScript => self.javascript = recipe,
            Language::Python => self.python = recipe,
        }
    }

    pub fn get(&self, language: Language) -> &ExecutionRecipe {
        match language {
            Language::JavaScript => &self.javascript,
            Language::Python => &self.python,
        }
    }
}
