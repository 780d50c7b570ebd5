//! Declaration parser.
//!
//! [`CompilerContext::compile_declaration`] looks at the first token of a
//! statement and, if it starts a declaration the current nest allows,
//! parses the whole declaration into the registry. Anything else is left
//! to the caller: in the parse pass it marks the start of a body, in the
//! compile pass it is a command.
//!
//! - `class`: class and interface headers, imports, raw text blocks
//! - `var`: variable types, names and dimensions, `var` and `local`
//! - `types`: enums, structs and consts
//! - `function`: functions, events, delegates and operators
//! - `state`: states and `ignores`

mod class;
mod function;
mod state;
mod types;
mod var;

pub(crate) use var::VarSite;

use unrealscript_core::{CompilationError, PropertyFlags};
use unrealscript_parser::TokenKind;

use crate::context::{CompilerContext, Pass, Result};
use crate::nest::{Allow, NestKind};
use crate::tokens::ScriptToken;

/// Words that may open a function declaration.
const FUNCTION_WORDS: [&str; 20] = [
    "function",
    "operator",
    "preoperator",
    "postoperator",
    "native",
    "intrinsic",
    "final",
    "private",
    "protected",
    "public",
    "latent",
    "iterator",
    "singular",
    "static",
    "exec",
    "delegate",
    "server",
    "client",
    "reliable",
    "unreliable",
];

impl<'a> CompilerContext<'a> {
    /// Compile the declaration starting at `token`.
    ///
    /// Returns `None` when `token` doesn't start a declaration, otherwise
    /// whether a `;` must follow.
    pub(crate) fn compile_declaration(&mut self, token: &ScriptToken<'a>) -> Result<Option<bool>> {
        if token.is_constant() {
            return Ok(None);
        }
        if token.is_symbol("#") {
            self.compile_directive()?;
            return Ok(Some(false));
        }
        if token.kind() != TokenKind::Identifier {
            if token.is_symbol(";") && self.pass == Pass::Parse && self.nests.top_kind() == NestKind::Class {
                return Ok(Some(false));
            }
            return Ok(None);
        }
        match self.pass {
            Pass::Parse => self.parse_declaration(token),
            Pass::Compile => self.compile_pass_declaration(token),
        }
    }

    fn parse_declaration(&mut self, token: &ScriptToken<'a>) -> Result<Option<bool>> {
        let word = token.lexeme();
        let allow = self.nests.top_allow();
        let is = |keyword: &str| word.eq_ignore_ascii_case(keyword);

        if (is("class") || is("interface")) && self.nests.level() < 3 {
            self.check_allow("'Class'", Allow::CLASS)?;
            self.compile_class_header(is("interface"))?;
            return Ok(Some(false));
        }
        if is("import") {
            self.compile_import()?;
            return Ok(Some(true));
        }
        if self.starts_function(word, allow)? {
            self.unget_token(token);
            return self.compile_function().map(Some);
        }
        if is("const") {
            let scope = self.class;
            self.compile_const(scope)?;
            return Ok(Some(true));
        }
        if is("var") {
            self.compile_variables(false)?;
            return Ok(Some(true));
        }
        if is("local") {
            self.compile_variables(true)?;
            return Ok(Some(true));
        }
        if is("enum") {
            self.check_allow("'Enum'", Allow::VAR_DECL)?;
            let scope = self.scope();
            self.compile_enum(scope)?;
            return Ok(Some(true));
        }
        if is("struct") {
            self.check_allow("'struct'", Allow::VAR_DECL)?;
            let scope = self.scope();
            self.compile_struct(scope)?;
            return Ok(Some(true));
        }
        if is("state") || is("auto") || (is("simulated") && allow.contains(Allow::STATE)) {
            self.unget_token(token);
            self.compile_state()?;
            return Ok(Some(false));
        }
        if is("ignores") {
            self.compile_ignores()?;
            return Ok(Some(true));
        }
        if is("replication") {
            self.skip_replication()?;
            return Ok(Some(false));
        }
        if is("cpptext") {
            self.compile_cpp_text()?;
            return Ok(Some(false));
        }
        if is("defaultproperties") {
            self.compile_default_properties()?;
            return Ok(Some(false));
        }
        Ok(None)
    }

    /// Whether `word` opens a function. `simulated` and `event` only count
    /// where functions may be declared; `simulated state` is a state.
    fn starts_function(&mut self, word: &str, allow: Allow) -> Result<bool> {
        let is = |keyword: &str| word.eq_ignore_ascii_case(keyword);
        if is("function") {
            return Ok(true);
        }
        if !allow.contains(Allow::FUNCTION) {
            return Ok(false);
        }
        if is("event") {
            return Ok(true);
        }
        if is("simulated") {
            let next = self.peek_raw()?;
            return Ok(!next.is_identifier("state") && !next.is_identifier("auto"));
        }
        if is("static") && self.peek_symbol(".")? {
            return Ok(false);
        }
        Ok(FUNCTION_WORDS.iter().any(|keyword| is(keyword)))
    }

    /// Declarations that can still appear once code is being compiled.
    fn compile_pass_declaration(&mut self, token: &ScriptToken<'a>) -> Result<Option<bool>> {
        if token.is_identifier("local") {
            // Declared in the parse pass; only the position is checked here.
            self.check_allow("'Local'", Allow::VAR_DECL)?;
            self.skip_to_semicolon("'Local'")?;
            return Ok(Some(false));
        }
        if token.is_identifier("const") {
            let scope = self.class;
            self.compile_const(scope)?;
            return Ok(Some(true));
        }
        Ok(None)
    }

    fn skip_to_semicolon(&mut self, tag: &str) -> Result<()> {
        loop {
            match self.next_raw(true)? {
                Some(token) if token.is_symbol(";") => return Ok(()),
                Some(_) => {}
                None => return Err(self.syntax_error(format!("Missing ';' in {tag}"))),
            }
        }
    }

    // ==========================================================================
    // Directives
    // ==========================================================================

    /// `#error`, `#linenumber N` and `#exec`; the rest of the line is ignored.
    fn compile_directive(&mut self) -> Result<()> {
        let Some(directive) = self.get_identifier()? else {
            return Err(self.syntax_error("Missing compiler directive after '#'"));
        };
        if directive.is_identifier("error") {
            return Err(CompilationError::Directive { span: directive.span });
        }
        if directive.is_identifier("linenumber") {
            let line = self.get_const_int("#linenumber")?;
            self.lexer.skip_line();
            // The line after the directive is line `N`.
            self.lexer.set_line(line.max(1) as u32);
            return Ok(());
        }
        if !directive.is_identifier("exec") {
            return Err(self.syntax_error(format!("Unrecognized compiler directive {}", directive.lexeme)));
        }
        self.lexer.skip_line();
        Ok(())
    }

    // ==========================================================================
    // Shared helpers
    // ==========================================================================

    /// Warn when a new field hides one of the same name in a base class.
    pub(crate) fn check_obscures(&mut self, scope: unrealscript_core::StructId, name: &str) {
        let Some(name) = self.registry.find_name(name) else {
            return;
        };
        let Some(base) = self.registry.struct_def(scope).super_struct else {
            return;
        };
        if let Some(field) = self.registry.find_field_in(base, &name) {
            let existing = self.field_path(field);
            self.warn(1, format!("'{name}' obscures '{existing}' defined in base class."));
        }
    }

    /// `Outer.Name` path of any field, for messages.
    pub(crate) fn field_path(&self, field: unrealscript_core::FieldRef) -> String {
        use unrealscript_core::FieldRef;
        let outer = match field {
            FieldRef::Struct(id) => return self.registry.path_name(id),
            FieldRef::Property(id) => self.registry.property(id).outer,
            FieldRef::Enum(id) => self.registry.enum_def(id).outer,
            FieldRef::Const(id) => self.registry.const_def(id).outer,
        };
        format!("{}.{}", self.registry.path_name(outer), self.registry.field_name(field))
    }

    /// Describe a field kind for conflict messages.
    pub(crate) fn field_kind(&self, field: unrealscript_core::FieldRef) -> &'static str {
        use unrealscript_core::FieldRef;
        match field {
            FieldRef::Struct(id) => self.registry.struct_def(id).kind().describe(),
            FieldRef::Property(_) => "variable",
            FieldRef::Enum(_) => "enum",
            FieldRef::Const(_) => "const",
        }
    }

    /// Optional `<Tag=Value|Tag=Value>` after a declaration name.
    pub(crate) fn parse_metadata_tags(&mut self) -> Result<Vec<(String, String)>> {
        if !self.match_symbol("<")? {
            return Ok(Vec::new());
        }
        let start = self.lexer.offset();
        let end = loop {
            let token = self.lexer.next_token(true)?;
            if token.is_eof() || token.is_symbol(";") {
                return Err(self.syntax_error("Missing '>' in metadata"));
            }
            if token.is_symbol(">") {
                break token.span.offset;
            }
        };
        let text = self.lexer.slice(start, end);
        let tags = text
            .split('|')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((tag, value)) => (tag.trim().to_string(), value.trim().to_string()),
                None => (entry.trim().to_string(), String::new()),
            })
            .collect();
        Ok(tags)
    }

    /// Flags a declaration specifier sets, or `None` for other words.
    pub(crate) fn property_specifier(word: &str) -> Option<PropertyFlags> {
        let flags = match word.to_ascii_lowercase().as_str() {
            "const" => PropertyFlags::CONST,
            "config" => PropertyFlags::CONFIG,
            "globalconfig" => PropertyFlags::GLOBAL_CONFIG | PropertyFlags::CONFIG,
            "localized" => PropertyFlags::LOCALIZED | PropertyFlags::CONST,
            "private" => PropertyFlags::PRIVATE,
            "protected" => PropertyFlags::PROTECTED,
            "privatewrite" => PropertyFlags::PRIVATE_WRITE,
            "protectedwrite" => PropertyFlags::PROTECTED_WRITE,
            "editconst" => PropertyFlags::EDIT_CONST,
            "transient" => PropertyFlags::TRANSIENT,
            "native" => PropertyFlags::NATIVE,
            "noexport" => PropertyFlags::NO_EXPORT,
            "out" => PropertyFlags::OUT_PARM,
            "export" => PropertyFlags::EXPORT_OBJECT,
            "editinline" => PropertyFlags::EDIT_INLINE,
            "noclear" => PropertyFlags::NO_CLEAR,
            "repnotify" => PropertyFlags::REP_NOTIFY,
            "interp" => PropertyFlags::INTERP | PropertyFlags::EDIT,
            "nontransactional" => PropertyFlags::NON_TRANSACTIONAL,
            "deprecated" => PropertyFlags::DEPRECATED,
            "skip" => PropertyFlags::SKIP_PARM,
            "coerce" => PropertyFlags::COERCE_PARM,
            "optional" => PropertyFlags::OPTIONAL_PARM,
            _ => return None,
        };
        Some(flags)
    }
}
