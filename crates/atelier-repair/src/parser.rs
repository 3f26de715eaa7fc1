//! Lightweight module parser for the component-markup dialect.
//!
//! The parser recovers exactly what binding analysis needs: import
//! declarations (including malformed ones), every identifier reference in
//! the module body, and the set of names the module declares itself. It is
//! not a full grammar; unknown constructs are scanned through token by
//! token, which keeps parsing total on arbitrary generator output.

use crate::ast::{IdentRef, ImportDecl, Module, ParseResult};
use crate::lexer::{Token, TokenKind, tokenize};

/// Reserved words that are never identifier references.
const KEYWORDS: &[&str] = &[
    "import", "from", "as", "export", "default", "function", "class", "const", "let", "var",
    "return", "if", "else", "for", "while", "do", "switch", "case", "break", "continue", "new",
    "typeof", "instanceof", "in", "of", "async", "await", "try", "catch", "finally", "throw",
    "this", "true", "false", "null", "undefined", "delete", "void", "extends", "super", "static",
    "yield", "interface", "type", "enum",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Parses component-markup source into a [`Module`].
pub fn parse(source: &str) -> ParseResult {
    let lexed = tokenize(source);
    let mut errors = lexed.errors;
    let tokens = lexed.tokens;

    let mut module = Module::default();
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        errors: &mut errors,
    };

    while parser.pos < parser.tokens.len() {
        if parser.at_import_statement() {
            let import = parser.parse_import();
            for name in import.bound_names() {
                module.declared.insert(name.clone());
            }
            module.imports.push(import);
        } else {
            parser.scan_body_token(&mut module);
        }
    }

    check_delimiter_balance(&tokens, &mut errors);

    ParseResult {
        success: errors.is_empty(),
        module: Some(module),
        errors,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: &'a mut Vec<String>,
}

impl<'a> Parser<'a> {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn prev(&self) -> Option<&Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Whether the cursor sits on an `import` statement (as opposed to a
    /// dynamic `import(...)` expression or a property named import).
    fn at_import_statement(&self) -> bool {
        let Some(token) = self.current() else {
            return false;
        };
        if !token.is_ident("import") {
            return false;
        }
        if self.prev().is_some_and(|p| p.is_punct('.')) {
            return false;
        }
        !self.peek(1).is_some_and(|n| n.is_punct('('))
    }

    fn parse_import(&mut self) -> ImportDecl {
        // Consume `import`.
        let start_line = self.current().map_or(1, |t| t.line);
        self.bump();
        let mut import = ImportDecl {
            start_line,
            end_line: start_line,
            source: String::new(),
            quoted: false,
            default: None,
            namespace: None,
            named: Vec::new(),
            valid: false,
        };

        // Side-effect import: `import "source";`
        if let Some(token) = self.current()
            && token.kind == TokenKind::Str
        {
            import.source = token.text.clone();
            import.quoted = true;
            import.valid = true;
            import.end_line = token.line;
            self.bump();
            self.consume_semicolon(&mut import);
            return import;
        }

        self.parse_import_clauses(&mut import);

        // `from "source"` — the part generators most often mangle.
        match self.current() {
            Some(token) if token.is_ident("from") => {
                import.end_line = token.line;
                self.bump();
                match self.current() {
                    Some(token) if token.kind == TokenKind::Str => {
                        import.source = token.text.clone();
                        import.quoted = true;
                        import.valid = true;
                        import.end_line = token.line;
                        self.bump();
                    }
                    Some(token) if token.kind == TokenKind::Ident => {
                        // Unquoted module specifier: `from react`.
                        import.source = token.text.clone();
                        import.quoted = false;
                        import.end_line = token.line;
                        self.errors.push(format!(
                            "malformed import at line {}: unquoted module specifier '{}'",
                            import.start_line, token.text
                        ));
                        self.bump();
                    }
                    _ => {
                        self.errors.push(format!(
                            "malformed import at line {}: missing module specifier",
                            import.start_line
                        ));
                    }
                }
            }
            _ => {
                self.errors.push(format!(
                    "malformed import at line {}: missing 'from' clause",
                    import.start_line
                ));
            }
        }

        self.consume_semicolon(&mut import);
        import
    }

    fn parse_import_clauses(&mut self, import: &mut ImportDecl) {
        loop {
            match self.current() {
                Some(token) if token.is_punct('{') => {
                    import.end_line = token.line;
                    self.bump();
                    self.parse_named_list(import);
                }
                Some(token) if token.is_punct('*') => {
                    import.end_line = token.line;
                    self.bump();
                    if self.current().is_some_and(|t| t.is_ident("as")) {
                        self.bump();
                        if let Some(name) = self.current()
                            && name.kind == TokenKind::Ident
                        {
                            import.namespace = Some(name.text.clone());
                            import.end_line = name.line;
                            self.bump();
                        }
                    }
                }
                Some(token)
                    if token.kind == TokenKind::Ident
                        && !token.is_ident("from")
                        && !is_keyword(&token.text) =>
                {
                    import.default = Some(token.text.clone());
                    import.end_line = token.line;
                    self.bump();
                }
                _ => break,
            }
            if self.current().is_some_and(|t| t.is_punct(',')) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn parse_named_list(&mut self, import: &mut ImportDecl) {
        while let Some(token) = self.current() {
            if token.is_punct('}') {
                import.end_line = token.line;
                self.bump();
                return;
            }
            if token.kind == TokenKind::Ident && !token.is_ident("as") {
                let mut bound = token.text.clone();
                import.end_line = token.line;
                self.bump();
                if self.current().is_some_and(|t| t.is_ident("as")) {
                    self.bump();
                    if let Some(alias) = self.current()
                        && alias.kind == TokenKind::Ident
                    {
                        bound = alias.text.clone();
                        import.end_line = alias.line;
                        self.bump();
                    }
                }
                import.named.push(bound);
            } else {
                self.bump();
            }
        }
        self.errors.push(format!(
            "malformed import at line {}: unterminated named import list",
            import.start_line
        ));
    }

    fn consume_semicolon(&mut self, import: &mut ImportDecl) {
        if let Some(token) = self.current()
            && token.is_punct(';')
        {
            import.end_line = token.line;
            self.bump();
        }
    }

    /// Handles one token of the module body: declaration tracking plus
    /// reference collection.
    fn scan_body_token(&mut self, module: &mut Module) {
        let Some(token) = self.current() else {
            return;
        };

        if token.kind != TokenKind::Ident {
            // Arrow parameters declare names; resolve them when the arrow
            // itself is seen so single-ident params are also caught.
            if token.is_punct('=') && self.peek(1).is_some_and(|t| t.is_punct('>')) {
                self.declare_arrow_params(module);
            }
            self.bump();
            return;
        }

        let word = token.text.clone();
        match word.as_str() {
            "function" | "class" => {
                self.bump();
                if let Some(name) = self.current()
                    && name.kind == TokenKind::Ident
                    && !is_keyword(&name.text)
                {
                    module.declared.insert(name.text.clone());
                    self.bump();
                    if word == "function" {
                        self.declare_paren_params(module);
                    }
                }
            }
            "const" | "let" | "var" => {
                self.bump();
                self.declare_binding_pattern(module);
            }
            _ if is_keyword(&word) => {
                self.bump();
            }
            _ => {
                let is_property = self.prev().is_some_and(|p| p.is_punct('.'));
                if !is_property {
                    module.references.push(IdentRef {
                        name: word,
                        line: token.line,
                        column: token.column,
                    });
                }
                self.bump();
            }
        }
    }

    /// Declares every identifier in a `const`/`let`/`var` binding pattern,
    /// destructuring included. Stops at `=`, `;` or anything that cannot be
    /// part of a pattern.
    fn declare_binding_pattern(&mut self, module: &mut Module) {
        while let Some(token) = self.current() {
            match token.kind {
                TokenKind::Ident if !is_keyword(&token.text) => {
                    module.declared.insert(token.text.clone());
                    self.bump();
                }
                TokenKind::Punct
                    if matches!(token.text.as_str(), "," | "[" | "]" | "{" | "}" | ":") =>
                {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// Declares parameters when the cursor sits on `(`.
    fn declare_paren_params(&mut self, module: &mut Module) {
        if !self.current().is_some_and(|t| t.is_punct('(')) {
            return;
        }
        self.bump();
        let mut depth = 1usize;
        while let Some(token) = self.bump() {
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            } else if token.kind == TokenKind::Ident && !is_keyword(&token.text) {
                module.declared.insert(token.text.clone());
            }
        }
    }

    /// Declares arrow-function parameters by walking back from a `=>`.
    fn declare_arrow_params(&mut self, module: &mut Module) {
        let Some(before) = self.pos.checked_sub(1) else {
            return;
        };
        let Some(prev) = self.tokens.get(before) else {
            return;
        };
        if prev.kind == TokenKind::Ident && !is_keyword(&prev.text) {
            module.declared.insert(prev.text.clone());
            return;
        }
        if prev.is_punct(')') {
            let mut depth = 1usize;
            let mut i = before;
            while i > 0 {
                i -= 1;
                let token = &self.tokens[i];
                if token.is_punct(')') {
                    depth += 1;
                } else if token.is_punct('(') {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                } else if token.kind == TokenKind::Ident && !is_keyword(&token.text) {
                    module.declared.insert(token.text.clone());
                }
            }
        }
    }
}

/// Reports unbalanced `()`/`[]`/`{}` as syntax errors. Angle brackets are
/// left alone: component markup uses them asymmetrically.
fn check_delimiter_balance(tokens: &[Token], errors: &mut Vec<String>) {
    let mut stack: Vec<(char, usize)> = Vec::new();
    for token in tokens {
        if token.kind != TokenKind::Punct {
            continue;
        }
        let Some(ch) = token.text.chars().next() else {
            continue;
        };
        match ch {
            '(' | '[' | '{' => stack.push((ch, token.line)),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, line)) => {
                        errors.push(format!(
                            "mismatched delimiter: '{open}' opened at line {line} closed by '{ch}' at line {}",
                            token.line
                        ));
                        return;
                    }
                    None => {
                        errors.push(format!(
                            "unbalanced delimiter: unexpected '{ch}' at line {}",
                            token.line
                        ));
                        return;
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((open, line)) = stack.pop() {
        errors.push(format!(
            "unbalanced delimiter: '{open}' opened at line {line} never closed"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_named_and_default_imports() {
        let result = parse("import React, { useState, useEffect as effect } from \"react\";\n");
        assert!(result.success, "errors: {:?}", result.errors);
        let module = result.module.unwrap();
        assert_eq!(module.imports.len(), 1);
        let import = &module.imports[0];
        assert_eq!(import.default.as_deref(), Some("React"));
        assert_eq!(import.named, vec!["useState", "effect"]);
        assert_eq!(import.source, "react");
        assert!(import.valid);
    }

    #[test]
    fn test_namespace_and_side_effect_imports() {
        let result = parse("import * as d3 from \"d3\";\nimport \"./styles.css\";\n");
        let module = result.module.unwrap();
        assert_eq!(module.imports[0].namespace.as_deref(), Some("d3"));
        assert_eq!(module.imports[1].source, "./styles.css");
        assert!(module.declared.contains("d3"));
    }

    #[test]
    fn test_unquoted_specifier_is_malformed_but_recovered() {
        let result = parse("import { useState } from react;\n");
        assert!(!result.success);
        let module = result.module.unwrap();
        let import = &module.imports[0];
        assert!(!import.valid);
        assert!(!import.quoted);
        assert_eq!(import.source, "react");
        assert_eq!(import.named, vec!["useState"]);
    }

    #[test]
    fn test_collects_free_references_not_properties() {
        let result = parse("const x = useState(0);\nconsole.log(x);\nobj.useState();\n");
        let module = result.module.unwrap();
        let names: Vec<_> = module.references.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"useState"));
        assert!(names.contains(&"console"));
        // Property accesses are not references.
        assert_eq!(names.iter().filter(|n| **n == "useState").count(), 1);
        assert!(!names.contains(&"log"));
        assert!(module.declared.contains("x"));
    }

    #[test]
    fn test_destructuring_declares_all_names() {
        let result = parse("const [count, setCount] = useState(0);\nconst { a, b: c } = obj;\n");
        let module = result.module.unwrap();
        for name in ["count", "setCount", "a", "b", "c"] {
            assert!(module.declared.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_function_and_arrow_params_are_declared() {
        let source = "function App(props) { return props.x; }\nconst f = (a, b) => a + b;\nconst g = n => n * 2;\n";
        let module = parse(source).module.unwrap();
        for name in ["App", "props", "f", "a", "b", "g", "n"] {
            assert!(module.declared.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_component_references_inside_markup() {
        let source = "function App() {\n  return <AnimatePresence><div className=\"x\">hi</div></AnimatePresence>;\n}\n";
        let module = parse(source).module.unwrap();
        assert!(module.references.iter().any(|r| r.name == "AnimatePresence"));
    }

    #[test]
    fn test_unbalanced_braces_fail_parse() {
        let result = parse("function App() { return 1;\n");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("never closed")));
    }

    #[test]
    fn test_dynamic_import_is_not_an_import_statement() {
        let result = parse("const mod = import(\"./lazy\");\n");
        assert!(result.success, "errors: {:?}", result.errors);
        assert!(result.module.unwrap().imports.is_empty());
    }
}
