//! The resolved token stream.
//!
//! The raw lexer only classifies characters. Here identifiers that spell a
//! constant are folded into one token carrying its value and type:
//! `vect(...)`, `rot(...)`, `true`/`false`, `ArrayCount(...)`, `NameOf(...)`,
//! `None`, enum tags (when the hint names the enum) and object literals
//! such as `Texture'Engine.Default'`.

use std::mem;

use unrealscript_core::{ConstId, FieldRef, PropertyKind, PropertyType};
use unrealscript_parser::{Lexer, Token, TokenKind};

use crate::context::{CompilerContext, Result};
use crate::ir::Constant;

/// A token plus the constant it spells, if any.
#[derive(Debug, Clone)]
pub struct ScriptToken<'s> {
    pub raw: Token<'s>,
    pub constant: Option<Constant>,
    /// Type of the constant; `None` kind for everything else.
    pub ty: PropertyType,
}

impl<'s> ScriptToken<'s> {
    fn plain(raw: Token<'s>) -> Self {
        Self {
            raw,
            constant: None,
            ty: PropertyType::none(),
        }
    }

    fn constant(raw: Token<'s>, constant: Constant, ty: PropertyType) -> Self {
        Self {
            raw,
            constant: Some(constant),
            ty,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn lexeme(&self) -> &'s str {
        self.raw.lexeme
    }

    pub fn kind(&self) -> TokenKind {
        self.raw.kind
    }

    pub fn is_identifier(&self, word: &str) -> bool {
        !self.is_constant() && self.raw.is_identifier(word)
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.raw.is_symbol(symbol)
    }
}

fn expect<'s>(lexer: &mut Lexer<'s>, symbol: &str) -> Result<bool> {
    let token = lexer.next_token(true)?;
    if token.is_symbol(symbol) {
        Ok(true)
    } else {
        lexer.rewind(&token);
        Ok(false)
    }
}

impl<'a> CompilerContext<'a> {
    /// Read the next token from the class source; `None` at end of input.
    pub fn get_token(&mut self, hint: Option<&PropertyType>, no_consts: bool) -> Result<Option<ScriptToken<'a>>> {
        let mut lexer = mem::replace(&mut self.lexer, Lexer::new(""));
        let token = self.read_token(&mut lexer, hint, no_consts);
        self.lexer = lexer;
        token
    }

    pub fn unget_token(&mut self, token: &ScriptToken<'a>) {
        self.lexer.rewind(&token.raw);
    }

    /// Read one token from `lexer`, folding constant forms unless `no_consts`.
    pub(crate) fn read_token<'s>(
        &mut self,
        lexer: &mut Lexer<'s>,
        hint: Option<&PropertyType>,
        no_consts: bool,
    ) -> Result<Option<ScriptToken<'s>>> {
        let raw = lexer.next_token(no_consts)?;
        let token = match raw.kind {
            TokenKind::Eof => return Ok(None),
            TokenKind::IntLiteral => {
                let value = raw.int_value();
                match hint {
                    Some(hint) if hint.kind == PropertyKind::Byte && (0..=255).contains(&value) => {
                        ScriptToken::constant(raw, Constant::Byte(value as u8), PropertyType::byte(hint.enum_def))
                    }
                    _ => ScriptToken::constant(raw, Constant::Int(value), PropertyType::new(PropertyKind::Int)),
                }
            }
            TokenKind::FloatLiteral => {
                let value = raw.float_value();
                ScriptToken::constant(raw, Constant::Float(value), PropertyType::new(PropertyKind::Float))
            }
            TokenKind::StringLiteral => {
                let value = raw.string_value();
                ScriptToken::constant(raw, Constant::String(value), PropertyType::new(PropertyKind::String))
            }
            TokenKind::NameLiteral => {
                let name = self.intern(raw.name_value());
                ScriptToken::constant(raw, Constant::Name(name), PropertyType::new(PropertyKind::Name))
            }
            TokenKind::Identifier if !no_consts => self.identifier_constant(lexer, raw, hint)?,
            TokenKind::Identifier | TokenKind::Symbol => ScriptToken::plain(raw),
        };
        Ok(Some(token))
    }

    fn identifier_constant<'s>(
        &mut self,
        lexer: &mut Lexer<'s>,
        raw: Token<'s>,
        hint: Option<&PropertyType>,
    ) -> Result<ScriptToken<'s>> {
        let word = raw.lexeme;
        let after = lexer.mark();

        if raw.is_identifier("vect") && expect(lexer, "(")? {
            let mut components = [0.0f32; 3];
            for (i, axis) in ["X", "Y", "Z"].iter().enumerate() {
                if i > 0 && !expect(lexer, ",")? {
                    return Err(self.syntax_error("Missing ',' in vector"));
                }
                components[i] = self
                    .number(lexer)?
                    .ok_or_else(|| self.syntax_error(format!("Missing {axis} component of vector")))?;
            }
            if !expect(lexer, ")")? {
                return Err(self.syntax_error("Missing ')' in vector"));
            }
            let ty = self.core_struct("Vector");
            return Ok(ScriptToken::constant(raw, Constant::Vector(components), ty));
        }

        if raw.is_identifier("rot") && expect(lexer, "(")? {
            let mut components = [0i32; 3];
            for (i, axis) in ["Pitch", "Yaw", "Roll"].iter().enumerate() {
                if i > 0 && !expect(lexer, ",")? {
                    return Err(self.syntax_error("Missing ',' in rotation"));
                }
                components[i] = self
                    .number(lexer)?
                    .map(|value| value as i32)
                    .ok_or_else(|| self.syntax_error(format!("Missing {axis} component of rotation")))?;
            }
            if !expect(lexer, ")")? {
                return Err(self.syntax_error("Missing ')' in rotation"));
            }
            let ty = self.core_struct("Rotator");
            return Ok(ScriptToken::constant(raw, Constant::Rotator(components), ty));
        }
        lexer.reset(after);

        if raw.is_identifier("true") || raw.is_identifier("false") {
            let value = raw.is_identifier("true");
            return Ok(ScriptToken::constant(raw, Constant::Bool(value), PropertyType::new(PropertyKind::Bool)));
        }

        if raw.is_identifier("ArrayCount") && expect(lexer, "(")? {
            let count = self.array_count(lexer)?;
            return Ok(ScriptToken::constant(raw, Constant::Int(count), PropertyType::new(PropertyKind::Int)));
        }
        lexer.reset(after);

        if raw.is_identifier("NameOf") && expect(lexer, "(")? {
            let target = lexer.next_token(true)?;
            if target.kind != TokenKind::Identifier {
                return Err(self.syntax_error("NameOf: Missing identifier"));
            }
            if !expect(lexer, ")")? {
                return Err(self.syntax_error("Missing ')' in 'NameOf'"));
            }
            let name = self.intern(target.lexeme);
            return Ok(ScriptToken::constant(raw, Constant::Name(name), PropertyType::new(PropertyKind::Name)));
        }
        lexer.reset(after);

        if raw.is_identifier("None") {
            if hint.is_some_and(|hint| hint.kind == PropertyKind::Delegate) {
                return Ok(ScriptToken::constant(raw, Constant::EmptyDelegate, PropertyType::delegate(None)));
            }
            return Ok(ScriptToken::constant(raw, Constant::Object(None), PropertyType::object(None)));
        }

        if let Some(enum_id) = hint.and_then(|hint| hint.enum_def) {
            if let Some(index) = self.registry.enum_def(enum_id).find_tag(word) {
                let ty = PropertyType::byte(Some(enum_id));
                return Ok(ScriptToken::constant(raw, Constant::Byte(index as u8), ty));
            }
        }

        if let Some(class) = self.registry.find_class(word) {
            let quote = lexer.peek_token(true)?;
            if quote.is_symbol("'") && quote.span.offset == raw.span.end() {
                lexer.next_token(true)?;
                return self.object_literal(lexer, raw, class);
            }
        }

        Ok(ScriptToken::plain(raw))
    }

    /// An int or float literal, sign included.
    fn number<'s>(&self, lexer: &mut Lexer<'s>) -> Result<Option<f32>> {
        let token = lexer.next_token(false)?;
        match token.kind {
            TokenKind::IntLiteral => Ok(Some(token.int_value() as f32)),
            TokenKind::FloatLiteral => Ok(Some(token.float_value())),
            _ => {
                lexer.rewind(&token);
                Ok(None)
            }
        }
    }

    fn array_count<'s>(&mut self, lexer: &mut Lexer<'s>) -> Result<i32> {
        let target = lexer.next_token(true)?;
        let scope = self.scope();
        let property = match self.registry.find_name(target.lexeme) {
            Some(name) if target.kind == TokenKind::Identifier => match self.registry.find_field(scope, &name) {
                Some(FieldRef::Property(id)) => Some(id),
                _ => None,
            },
            _ => None,
        };
        let Some(property) = property else {
            return Err(self.syntax_error(format!("ArrayCount: Bad property '{}'", target.lexeme)));
        };
        let dim = self.registry.property(property).ty.array_dim;
        if dim <= 1 {
            return Err(self.syntax_error("ArrayCount argument is not an array"));
        }
        if !expect(lexer, ")")? {
            return Err(self.syntax_error("Missing ')' in 'ArrayCount'"));
        }
        Ok(dim)
    }

    fn object_literal<'s>(
        &mut self,
        lexer: &mut Lexer<'s>,
        raw: Token<'s>,
        class: unrealscript_core::StructId,
    ) -> Result<ScriptToken<'s>> {
        let class_word = self.registry.struct_def(class).name.to_string();
        let mut path = String::new();
        loop {
            let part = lexer.next_token(true)?;
            if part.is_eof() {
                return Err(self.syntax_error(format!("Missing single quote after {class_word} name")));
            }
            if part.is_symbol("'") {
                break;
            }
            path.push_str(part.lexeme);
        }
        if path.is_empty() {
            return Err(self.syntax_error(format!("Missing {class_word} name")));
        }

        let actor = self.registry.find_class("Actor");
        if actor.is_some_and(|actor| self.registry.is_child_of(class, actor)) {
            return Err(self.syntax_error("Illegal actor constant"));
        }

        let class_class = self.registry.class_class();
        if self.registry.is_child_of(class, class_class) {
            let short = path.rsplit('.').next().unwrap_or(path.as_str());
            return match self.registry.find_class(short) {
                Some(meta) => {
                    let object = self.registry.register_object(class_class, short);
                    let ty = PropertyType::class_ref(class_class, meta);
                    Ok(ScriptToken::constant(raw, Constant::Object(Some(object)), ty))
                }
                None => {
                    self.warn(1, format!("Unresolved reference to {class_word} '{path}'"));
                    let ty = PropertyType::class_ref(class_class, self.registry.object_class());
                    Ok(ScriptToken::constant(raw, Constant::Object(None), ty))
                }
            };
        }

        let mut object = self.registry.find_object(class, &path);
        if object.is_none() {
            if let Some(loader) = self.loader.as_deref_mut() {
                object = loader.load(&mut *self.registry, class, &path);
            }
        }
        if object.is_none() {
            self.warn(1, format!("Unresolved reference to {class_word} '{path}'"));
        }
        Ok(ScriptToken::constant(raw, Constant::Object(object), PropertyType::object(Some(class))))
    }

    /// The `Vector`/`Rotator` struct type, or an unbound struct if the class tree lacks it.
    pub fn core_struct(&self, name: &str) -> PropertyType {
        match self.registry.find_script_struct(name) {
            Some(id) => PropertyType::structure(id),
            None => PropertyType::new(PropertyKind::Struct),
        }
    }

    /// Re-tokenize a named const's text.
    pub fn resolve_const(&mut self, id: ConstId, hint: Option<&PropertyType>) -> Result<(Constant, PropertyType)> {
        let text = self.registry.const_def(id).value.clone();
        let mut lexer = Lexer::new(&text);
        match self.read_token(&mut lexer, hint, false)? {
            Some(ScriptToken {
                constant: Some(constant),
                ty,
                ..
            }) => Ok((constant, ty)),
            _ => Err(self.syntax_error("Error in constant")),
        }
    }
}
