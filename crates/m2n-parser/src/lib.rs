
use m2n_ast::*;
use m2n_diags::DiagnosticError;
use m2n_lexer::{Lexer, Span, Token, TokenWithSpan};

pub struct Parser {
    tokens: Vec<TokenWithSpan>,
    current: usize,
}

#[derive(Debug, Default)]
struct Modifiers {
    visibility: Option<Visibility>,
    is_static: bool,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, DiagnosticError> {
        let lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        Ok(Self { tokens, current: 0 })
    }

    pub fn parse(mut self) -> Result<Assembly, DiagnosticError> {
        let items = self.parse_items(false)?;
        Ok(Assembly { items })
    }

    fn parse_items(&mut self, nested: bool) -> Result<Vec<Item>, DiagnosticError> {
        let mut items = Vec::new();

        while !self.is_at_end() && !(nested && self.check(&Token::RightBrace)) {
            if self.match_token(&Token::Using) {
                self.parse_dotted_name("Expected namespace after 'using'")?;
                self.consume(Token::Semicolon, "Expected ';' after using directive")?;
            } else if self.check(&Token::Namespace) {
                items.push(Item::Namespace(self.parse_namespace()?));
            } else {
                items.push(Item::Type(self.parse_type_decl()?));
            }
        }

        Ok(items)
    }

    fn parse_namespace(&mut self) -> Result<NamespaceDecl, DiagnosticError> {
        let start = self.current_span().start;
        self.consume(Token::Namespace, "Expected 'namespace'")?;

        let path = self.parse_dotted_name("Expected namespace name")?.segments;

        self.consume(Token::LeftBrace, "Expected '{' after namespace name")?;
        let items = self.parse_items(true)?;
        self.consume(Token::RightBrace, "Expected '}' to close namespace")?;

        Ok(NamespaceDecl {
            path,
            items,
            span: Span::new(start, self.previous_span().end),
        })
    }

    fn parse_type_decl(&mut self) -> Result<TypeDecl, DiagnosticError> {
        let start = self.current_span().start;
        let attributes = self.parse_attributes()?;
        let modifiers = self.parse_modifiers();

        let kind_token = self.peek().token.clone();
        match kind_token {
            Token::Class | Token::Struct => {
                self.advance();
                let name = self.consume_identifier("Expected type name")?;

                let base = if self.match_token(&Token::Colon) {
                    let base = self.parse_dotted_name("Expected base type name")?;
                    if self.check(&Token::Comma) {
                        return Err(DiagnosticError::syntax(
                            "Multiple base types are not supported",
                            self.current_span(),
                        ));
                    }
                    Some(base)
                } else {
                    None
                };

                let members = self.parse_class_body(&name)?;
                let body = ClassBody { base, members };
                let kind = if kind_token == Token::Class {
                    TypeDeclKind::Class(body)
                } else {
                    TypeDeclKind::Struct(body)
                };

                Ok(TypeDecl {
                    name,
                    kind,
                    visibility: modifiers.visibility.unwrap_or(Visibility::Internal),
                    is_static: modifiers.is_static,
                    attributes,
                    span: Span::new(start, self.previous_span().end),
                })
            }
            Token::Enum => {
                self.advance();
                let name = self.consume_identifier("Expected enum name")?;
                let body = self.parse_enum_body()?;

                Ok(TypeDecl {
                    name,
                    kind: TypeDeclKind::Enum(body),
                    visibility: modifiers.visibility.unwrap_or(Visibility::Internal),
                    is_static: modifiers.is_static,
                    attributes,
                    span: Span::new(start, self.previous_span().end),
                })
            }
            other => Err(DiagnosticError::syntax(
                format!("Expected 'class', 'struct' or 'enum', found {}", other.describe()),
                self.current_span(),
            )),
        }
    }

    fn parse_class_body(&mut self, class_name: &str) -> Result<Vec<Member>, DiagnosticError> {
        self.consume(Token::LeftBrace, "Expected '{' after type name")?;

        let mut members = Vec::new();
        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            members.push(self.parse_member(class_name)?);
        }

        self.consume(Token::RightBrace, "Expected '}' to close type body")?;
        self.match_token(&Token::Semicolon);
        Ok(members)
    }

    fn parse_member(&mut self, class_name: &str) -> Result<Member, DiagnosticError> {
        let start = self.current_span().start;
        self.parse_attributes()?;
        let modifiers = self.parse_modifiers();
        let visibility = modifiers.visibility.unwrap_or(Visibility::Private);

        match &self.peek().token {
            Token::Class | Token::Struct | Token::Enum => {
                return Err(DiagnosticError::syntax(
                    "Nested types are not supported",
                    self.current_span(),
                ));
            }
            Token::Operator | Token::Event => {
                return Err(DiagnosticError::syntax(
                    format!("{} declarations are not supported", self.peek().token.describe()),
                    self.current_span(),
                ));
            }
            Token::Ident(name) if name == class_name && self.peek_next() == Some(&Token::LeftParen) => {
                let name = name.clone();
                self.advance();
                self.consume(Token::LeftParen, "Expected '('")?;
                let params = self.parse_parameters()?;
                self.consume(Token::RightParen, "Expected ')' after parameters")?;
                self.consume(Token::Semicolon, "Expected ';' after constructor declaration")?;

                return Ok(Member {
                    name,
                    kind: MemberKind::Constructor { params },
                    visibility,
                    is_static: modifiers.is_static,
                    span: Span::new(start, self.previous_span().end),
                });
            }
            _ => {}
        }

        let ty = self.parse_type()?;

        if self.check(&Token::Operator) {
            return Err(DiagnosticError::syntax(
                "operator declarations are not supported",
                self.current_span(),
            ));
        }

        let name = self.consume_identifier("Expected member name")?;

        let kind = if self.match_token(&Token::LeftParen) {
            let params = self.parse_parameters()?;
            self.consume(Token::RightParen, "Expected ')' after parameters")?;
            self.consume(Token::Semicolon, "Expected ';' after method declaration")?;
            MemberKind::Method {
                params,
                return_type: ty,
            }
        } else if self.check(&Token::LeftBrace) {
            let (getter, setter) = self.parse_accessors(visibility)?;
            MemberKind::Property { ty, getter, setter }
        } else if self.check(&Token::Semicolon) || self.check(&Token::Assign) {
            return Err(DiagnosticError::syntax(
                format!("Fields are not supported; declare '{}' as a property", name),
                self.previous_span(),
            ));
        } else {
            return Err(DiagnosticError::syntax(
                format!(
                    "Expected '(' or '{{' after member name, found {}",
                    self.peek().token.describe()
                ),
                self.current_span(),
            ));
        };

        Ok(Member {
            name,
            kind,
            visibility,
            is_static: modifiers.is_static,
            span: Span::new(start, self.previous_span().end),
        })
    }

    fn parse_accessors(
        &mut self,
        property_visibility: Visibility,
    ) -> Result<(Option<Accessor>, Option<Accessor>), DiagnosticError> {
        let open = self.current_span();
        self.consume(Token::LeftBrace, "Expected '{'")?;

        let mut getter = None;
        let mut setter = None;

        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            let start = self.current_span().start;
            let modifiers = self.parse_modifiers();
            let visibility = modifiers.visibility.unwrap_or(property_visibility);

            let slot = if self.match_token(&Token::Get) {
                &mut getter
            } else if self.match_token(&Token::Set) {
                &mut setter
            } else {
                return Err(DiagnosticError::syntax(
                    format!("Expected 'get' or 'set', found {}", self.peek().token.describe()),
                    self.current_span(),
                ));
            };

            let span = Span::new(start, self.previous_span().end);
            if slot.is_some() {
                return Err(DiagnosticError::syntax("Duplicate property accessor", span));
            }
            *slot = Some(Accessor { visibility, span });

            self.consume(Token::Semicolon, "Expected ';' after accessor")?;
        }

        self.consume(Token::RightBrace, "Expected '}' after accessors")?;

        if getter.is_none() && setter.is_none() {
            return Err(DiagnosticError::syntax(
                "Property must declare at least one accessor",
                open.merge(self.previous_span()),
            ));
        }

        Ok((getter, setter))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, DiagnosticError> {
        let mut params = Vec::new();

        if !self.check(&Token::RightParen) {
            loop {
                let start = self.current_span().start;
                self.parse_attributes()?;

                let modifier = if self.match_token(&Token::Out) {
                    ParamModifier::Out
                } else if self.match_token(&Token::Ref) {
                    ParamModifier::Ref
                } else if self.match_token(&Token::In) {
                    ParamModifier::In
                } else {
                    ParamModifier::None
                };

                let ty = self.parse_type()?;
                let name = self.consume_identifier("Expected parameter name")?;

                if self.check(&Token::Assign) {
                    return Err(DiagnosticError::syntax(
                        "Default parameter values are not supported",
                        self.current_span(),
                    ));
                }

                params.push(Parameter {
                    name,
                    ty,
                    modifier,
                    span: Span::new(start, self.previous_span().end),
                });

                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        Ok(params)
    }

    fn parse_type(&mut self) -> Result<Type, DiagnosticError> {
        let mut ty = if self.match_token(&Token::Void) {
            Type::Void
        } else {
            let name = self.parse_dotted_name("Expected type name")?;

            if self.match_token(&Token::Less) {
                let mut args = Vec::new();
                loop {
                    args.push(self.parse_type()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.consume(Token::Greater, "Expected '>' after type arguments")?;
                Type::Generic(name, args)
            } else if name.segments.len() == 1 {
                match name.segments[0].as_str() {
                    "string" => Type::String,
                    keyword => match PrimitiveKind::from_keyword(keyword) {
                        Some(kind) => Type::Primitive(kind),
                        None => Type::Named(name),
                    },
                }
            } else {
                Type::Named(name)
            }
        };

        while self.match_token(&Token::LeftBracket) {
            self.consume(Token::RightBracket, "Expected ']' (only single-dimension arrays are supported)")?;
            ty = Type::Array(Box::new(ty));
        }

        if self.match_token(&Token::Question) {
            ty = Type::Nullable(Box::new(ty));
        }

        Ok(ty)
    }

    fn parse_enum_body(&mut self) -> Result<EnumBody, DiagnosticError> {
        let underlying = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(Token::LeftBrace, "Expected '{' after enum name")?;

        let mut items = Vec::new();
        while !self.check(&Token::RightBrace) && !self.is_at_end() {
            let start = self.current_span().start;
            self.parse_attributes()?;
            let name = self.consume_identifier("Expected enum item name")?;

            let value = if self.match_token(&Token::Assign) {
                Some(self.parse_enum_expr()?)
            } else {
                None
            };

            items.push(EnumItemDecl {
                name,
                value,
                span: Span::new(start, self.previous_span().end),
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(Token::RightBrace, "Expected '}' after enum items")?;
        self.match_token(&Token::Semicolon);

        Ok(EnumBody { underlying, items })
    }

    fn parse_enum_expr(&mut self) -> Result<EnumExpr, DiagnosticError> {
        let mut expr = self.parse_enum_shift()?;

        while self.match_token(&Token::Pipe) {
            let right = self.parse_enum_shift()?;
            expr = EnumExpr::BitOr(Box::new(expr), Box::new(right));
        }

        Ok(expr)
    }

    fn parse_enum_shift(&mut self) -> Result<EnumExpr, DiagnosticError> {
        let mut expr = self.parse_enum_unary()?;

        while self.match_token(&Token::ShiftLeft) {
            let right = self.parse_enum_unary()?;
            expr = EnumExpr::ShiftLeft(Box::new(expr), Box::new(right));
        }

        Ok(expr)
    }

    fn parse_enum_unary(&mut self) -> Result<EnumExpr, DiagnosticError> {
        if self.match_token(&Token::Minus) {
            let start = self.previous_span().start;
            let operand = self.parse_enum_unary()?;
            let span = Span::new(start, operand.span().end);
            return Ok(EnumExpr::Negate(Box::new(operand), span));
        }

        self.parse_enum_primary()
    }

    fn parse_enum_primary(&mut self) -> Result<EnumExpr, DiagnosticError> {
        let span = self.current_span();

        match self.peek().token.clone() {
            Token::IntLiteral(value) => {
                self.advance();
                Ok(EnumExpr::Literal(value, span))
            }
            Token::Ident(_) => {
                // `Flags.FlagOne` and `FlagOne` name the same item.
                let name = self.parse_dotted_name("Expected enum item")?;
                let item = name.segments.last().cloned().unwrap_or_default();
                Ok(EnumExpr::Item(item, name.span))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_enum_expr()?;
                self.consume(Token::RightParen, "Expected ')'")?;
                Ok(expr)
            }
            other => Err(DiagnosticError::syntax(
                format!("Expected enum value, found {}", other.describe()),
                span,
            )),
        }
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, DiagnosticError> {
        let mut attributes = Vec::new();

        while self.match_token(&Token::LeftBracket) {
            loop {
                let span = self.current_span();
                let name = self.consume_identifier("Expected attribute name")?;
                attributes.push(Attribute { name, span });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.consume(Token::RightBracket, "Expected ']' after attribute")?;
        }

        Ok(attributes)
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();

        loop {
            let visibility = match self.peek().token {
                Token::Public => Some(Visibility::Public),
                Token::Internal => Some(Visibility::Internal),
                Token::Protected => Some(Visibility::Protected),
                Token::Private => Some(Visibility::Private),
                Token::Static => {
                    modifiers.is_static = true;
                    None
                }
                Token::Sealed | Token::Abstract | Token::Virtual | Token::Override | Token::Readonly => None,
                _ => break,
            };
            self.advance();

            // `protected internal` and friends keep the first keyword.
            if let Some(visibility) = visibility {
                if modifiers.visibility.is_none() || visibility == Visibility::Public {
                    modifiers.visibility = Some(visibility);
                }
            }
        }

        modifiers
    }

    fn parse_dotted_name(&mut self, message: &str) -> Result<TypeName, DiagnosticError> {
        let start = self.current_span();
        let mut segments = vec![self.consume_identifier(message)?];

        while self.match_token(&Token::Dot) {
            segments.push(self.consume_identifier("Expected identifier after '.'")?);
        }

        Ok(TypeName {
            segments,
            span: start.merge(self.previous_span()),
        })
    }

    // Helper methods

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1).map(|t| &t.token)
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(&self.peek().token) == std::mem::discriminant(token)
        }
    }

    fn advance(&mut self) -> &TokenWithSpan {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token, Token::Eof)
    }

    fn peek(&self) -> &TokenWithSpan {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &TokenWithSpan {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn previous_span(&self) -> Span {
        self.previous().span
    }

    fn consume(&mut self, token: Token, message: &str) -> Result<(), DiagnosticError> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            Err(DiagnosticError::syntax(
                format!("{}, found {}", message, self.peek().token.describe()),
                self.current_span(),
            ))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String, DiagnosticError> {
        if let Token::Ident(name) = &self.peek().token {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(DiagnosticError::syntax(
                format!("{}, found {}", message, self.peek().token.describe()),
                self.current_span(),
            ))
        }
    }
}
