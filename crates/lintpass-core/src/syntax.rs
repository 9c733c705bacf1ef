//! Arena-backed syntax tree lowered from a `syn` AST.
//!
//! The tree owns every node; other subsystems refer to nodes by [`NodeId`]
//! and copy their [`Span`] instead of holding references into the AST. Nodes
//! are stored in depth-first pre-order, so iterating the arena is the same as
//! walking the tree parent-first.

use std::collections::HashMap;

use proc_macro2::extra::DelimSpan;
use proc_macro2::{Delimiter, LineColumn, TokenStream, TokenTree};
use quote::ToTokens;
use serde::Serialize;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{Expr, Stmt};

use crate::line_index::{to_u32, LineIndex};
use crate::span::{FileId, Span};

/// Handle of a node inside a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Coarse syntactic category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The whole file.
    File,
    /// Module-level item (`fn`, `struct`, `impl`, ...).
    Item,
    /// Item inside an `impl` block.
    ImplItem,
    /// Item inside a `trait` block.
    TraitItem,
    /// Item inside an `extern` block.
    ForeignItem,
    /// Struct or union field.
    Field,
    /// Enum variant.
    Variant,
    /// Statement.
    Stmt,
    /// Expression.
    Expr,
    /// Braced block.
    Block,
    /// `match` arm.
    Arm,
    /// Pattern.
    Pat,
    /// Type.
    Type,
    /// Identifier.
    Ident,
}

impl NodeKind {
    /// Returns the lowercase name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Item => "item",
            Self::ImplItem => "impl_item",
            Self::TraitItem => "trait_item",
            Self::ForeignItem => "foreign_item",
            Self::Field => "field",
            Self::Variant => "variant",
            Self::Stmt => "stmt",
            Self::Expr => "expr",
            Self::Block => "block",
            Self::Arm => "arm",
            Self::Pat => "pat",
            Self::Type => "type",
            Self::Ident => "ident",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the lowered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Syntactic category.
    pub kind: NodeKind,
    /// Byte range, excluding leading outer attributes.
    pub span: Span,
    /// Enclosing node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Direct children in visiting order.
    pub children: Vec<NodeId>,
}

/// Syntax tree of one file, stored as a pre-order arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    /// Lowers a parsed file into an arena.
    ///
    /// `text` must be the exact text `ast` was parsed from.
    #[must_use]
    pub fn lower(file: FileId, ast: &syn::File, text: &str, lines: &LineIndex) -> Self {
        let mut lowering = Lowering {
            file,
            text,
            lines,
            nodes: Vec::new(),
            stack: Vec::new(),
            exprs: HashMap::new(),
        };

        let text_end = to_u32(text.len());
        let file_start = ast
            .to_token_stream()
            .into_iter()
            .next()
            .map_or(text_end, |first| lowering.offset(first.span().start()));
        lowering.push(NodeKind::File, Span::new(file, file_start, text_end));
        visit::visit_file(&mut lowering, ast);

        Self {
            nodes: lowering.nodes,
        }
    }

    /// Returns the root (file) node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Returns the span covered by the root node.
    #[must_use]
    pub fn root_span(&self) -> Span {
        self.nodes[0].span
    }

    /// Returns the node for `id`, if it belongs to this tree.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates nodes in depth-first pre-order.
    pub fn preorder(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(to_u32(i)), node))
    }

    /// First node in pre-order whose start is strictly after `offset`.
    ///
    /// Parents come before children, so when several nodes share a start the
    /// broadest one is returned.
    #[must_use]
    pub fn first_after(&self, offset: u32) -> Option<NodeId> {
        self.preorder()
            .find(|(_, node)| node.span.start > offset)
            .map(|(id, _)| id)
    }

    /// First node in pre-order that starts exactly at `offset`.
    #[must_use]
    pub fn node_at(&self, offset: u32) -> Option<NodeId> {
        self.preorder()
            .find(|(_, node)| node.span.start == offset)
            .map(|(id, _)| id)
    }
}

struct Lowering<'a> {
    file: FileId,
    text: &'a str,
    lines: &'a LineIndex,
    nodes: Vec<Node>,
    stack: Vec<NodeId>,
    /// Bounds of expressions already measured, keyed by address in the AST.
    exprs: HashMap<*const Expr, Option<Bounds>>,
}

/// Start and end offsets of a node.
type Bounds = (u32, u32);

fn join(first: Option<Bounds>, last: Option<Bounds>) -> Option<Bounds> {
    match (first, last) {
        (Some((start, _)), Some((_, end))) => Some((start, end.max(start))),
        (bounds, None) | (None, bounds) => bounds,
    }
}

impl Lowering<'_> {
    fn offset(&self, at: LineColumn) -> u32 {
        self.lines.offset(self.text, at.line, at.column)
    }

    fn span_bounds(&self, span: proc_macro2::Span) -> Bounds {
        let start = self.offset(span.start());
        (start, self.offset(span.end()).max(start))
    }

    fn delim_bounds(&self, span: &DelimSpan) -> Bounds {
        let start = self.offset(span.open().start());
        (start, self.offset(span.close().end()).max(start))
    }

    /// Bounds of `tokens` without leading outer attributes.
    fn token_bounds(&self, tokens: TokenStream) -> Option<Bounds> {
        let trees: Vec<TokenTree> = tokens.into_iter().collect();
        let body = match skip_outer_attributes(&trees) {
            [] => trees.as_slice(),
            body => body,
        };
        let (first, last) = (body.first()?, body.last()?);
        let start = self.offset(first.span().start());
        Some((start, self.offset(last.span().end()).max(start)))
    }

    /// Bounds of `expr` without its outer attributes.
    ///
    /// Operator and postfix chains are measured through their operands, and
    /// every measured operand is cached, so a chain nested `n` deep is
    /// measured in linear time.
    fn expr_bounds(&mut self, expr: &Expr) -> Option<Bounds> {
        let key: *const Expr = expr;
        if let Some(bounds) = self.exprs.get(&key) {
            return *bounds;
        }
        let bounds = match expr {
            Expr::Binary(e) => join(self.expr_bounds(&e.left), self.expr_bounds(&e.right)),
            Expr::Assign(e) => join(self.expr_bounds(&e.left), self.expr_bounds(&e.right)),
            Expr::Unary(e) => join(Some(self.span_bounds(e.op.span())), self.expr_bounds(&e.expr)),
            Expr::MethodCall(e) => join(
                self.expr_bounds(&e.receiver),
                Some(self.delim_bounds(&e.paren_token.span)),
            ),
            Expr::Call(e) => join(
                self.expr_bounds(&e.func),
                Some(self.delim_bounds(&e.paren_token.span)),
            ),
            Expr::Index(e) => join(
                self.expr_bounds(&e.expr),
                Some(self.delim_bounds(&e.bracket_token.span)),
            ),
            Expr::Field(e) => join(self.expr_bounds(&e.base), Some(self.span_bounds(e.member.span()))),
            Expr::Try(e) => join(
                self.expr_bounds(&e.expr),
                Some(self.span_bounds(e.question_token.span())),
            ),
            Expr::Await(e) => join(
                self.expr_bounds(&e.base),
                Some(self.span_bounds(e.await_token.span())),
            ),
            Expr::Paren(e) => Some(self.delim_bounds(&e.paren_token.span)),
            Expr::Block(e) if e.label.is_none() => Some(self.delim_bounds(&e.block.brace_token.span)),
            _ => self.token_bounds(expr.to_token_stream()),
        };
        self.exprs.insert(key, bounds);
        bounds
    }

    fn push(&mut self, kind: NodeKind, span: Span) {
        let id = NodeId(to_u32(self.nodes.len()));
        let parent = self.stack.last().copied();
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.nodes.push(Node {
            kind,
            span,
            parent,
            children: Vec::new(),
        });
        self.stack.push(id);
    }

    /// Opens a node over `bounds`; returns false when there are none.
    fn enter(&mut self, kind: NodeKind, bounds: Option<Bounds>) -> bool {
        let Some((start, end)) = bounds else {
            return false;
        };
        self.push(kind, Span::new(self.file, start, end));
        true
    }

    fn enter_tokens(&mut self, kind: NodeKind, tokens: TokenStream) -> bool {
        let bounds = self.token_bounds(tokens);
        self.enter(kind, bounds)
    }

    fn leave(&mut self, entered: bool) {
        if entered {
            self.stack.pop();
        }
    }
}

/// Strips leading `#[...]` attributes (doc comments included).
fn skip_outer_attributes(mut trees: &[TokenTree]) -> &[TokenTree] {
    while let [TokenTree::Punct(hash), TokenTree::Group(group), rest @ ..] = trees {
        if hash.as_char() != '#' || group.delimiter() != Delimiter::Bracket {
            break;
        }
        trees = rest;
    }
    trees
}

impl<'ast> Visit<'ast> for Lowering<'_> {
    fn visit_attribute(&mut self, _attr: &'ast syn::Attribute) {}

    fn visit_item(&mut self, node: &'ast syn::Item) {
        let entered = self.enter_tokens(NodeKind::Item, node.to_token_stream());
        visit::visit_item(self, node);
        self.leave(entered);
    }

    fn visit_impl_item(&mut self, node: &'ast syn::ImplItem) {
        let entered = self.enter_tokens(NodeKind::ImplItem, node.to_token_stream());
        visit::visit_impl_item(self, node);
        self.leave(entered);
    }

    fn visit_trait_item(&mut self, node: &'ast syn::TraitItem) {
        let entered = self.enter_tokens(NodeKind::TraitItem, node.to_token_stream());
        visit::visit_trait_item(self, node);
        self.leave(entered);
    }

    fn visit_foreign_item(&mut self, node: &'ast syn::ForeignItem) {
        let entered = self.enter_tokens(NodeKind::ForeignItem, node.to_token_stream());
        visit::visit_foreign_item(self, node);
        self.leave(entered);
    }

    fn visit_field(&mut self, node: &'ast syn::Field) {
        let entered = self.enter_tokens(NodeKind::Field, node.to_token_stream());
        visit::visit_field(self, node);
        self.leave(entered);
    }

    fn visit_variant(&mut self, node: &'ast syn::Variant) {
        let entered = self.enter_tokens(NodeKind::Variant, node.to_token_stream());
        visit::visit_variant(self, node);
        self.leave(entered);
    }

    fn visit_stmt(&mut self, node: &'ast syn::Stmt) {
        let bounds = match node {
            Stmt::Expr(expr, semi) => {
                let expr = self.expr_bounds(expr);
                join(expr, semi.as_ref().map(|semi| self.span_bounds(semi.span())))
            }
            _ => self.token_bounds(node.to_token_stream()),
        };
        let entered = self.enter(NodeKind::Stmt, bounds);
        visit::visit_stmt(self, node);
        self.leave(entered);
    }

    fn visit_expr(&mut self, node: &'ast syn::Expr) {
        let bounds = self.expr_bounds(node);
        let entered = self.enter(NodeKind::Expr, bounds);
        visit::visit_expr(self, node);
        self.leave(entered);
    }

    fn visit_block(&mut self, node: &'ast syn::Block) {
        let bounds = self.delim_bounds(&node.brace_token.span);
        let entered = self.enter(NodeKind::Block, Some(bounds));
        visit::visit_block(self, node);
        self.leave(entered);
    }

    fn visit_arm(&mut self, node: &'ast syn::Arm) {
        let entered = self.enter_tokens(NodeKind::Arm, node.to_token_stream());
        visit::visit_arm(self, node);
        self.leave(entered);
    }

    fn visit_pat(&mut self, node: &'ast syn::Pat) {
        let entered = self.enter_tokens(NodeKind::Pat, node.to_token_stream());
        visit::visit_pat(self, node);
        self.leave(entered);
    }

    fn visit_type(&mut self, node: &'ast syn::Type) {
        let entered = self.enter_tokens(NodeKind::Type, node.to_token_stream());
        visit::visit_type(self, node);
        self.leave(entered);
    }

    fn visit_ident(&mut self, ident: &'ast proc_macro2::Ident) {
        let (start, end) = self.span_bounds(ident.span());
        self.push(NodeKind::Ident, Span::new(self.file, start, end));
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(text: &str) -> SyntaxTree {
        let ast = syn::parse_file(text).expect("fixture should parse");
        SyntaxTree::lower(FileId(0), &ast, text, &LineIndex::new(text))
    }

    fn kind_at(tree: &SyntaxTree, id: Option<NodeId>) -> Option<NodeKind> {
        id.and_then(|id| tree.get(id)).map(|node| node.kind)
    }

    #[test]
    fn test_root_starts_at_first_token() {
        let text = "// header\n\nfn main() {}\n";
        let tree = lower(text);

        let root = tree.root_span();
        assert_eq!(root.start, 11);
        assert_eq!(root.end as usize, text.len());
        assert_eq!(kind_at(&tree, Some(tree.root())), Some(NodeKind::File));
    }

    #[test]
    fn test_empty_file_root_starts_at_end() {
        let text = "// only a comment\n";
        let tree = lower(text);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root_span().start as usize, text.len());
    }

    #[test]
    fn test_preorder_parents_first() {
        let tree = lower("fn main() {\n    let x = 5;\n}\n");

        for (id, node) in tree.preorder() {
            if let Some(parent) = node.parent {
                assert!(parent < id, "parent must precede child");
            }
        }
    }

    #[test]
    fn test_first_after_picks_broadest_statement() {
        let text = "fn main() {\n    // note\n    let x = 5;\n}\n";
        let tree = lower(text);
        let comment = u32::try_from(text.find("// note").unwrap()).unwrap();

        let id = tree.first_after(comment).expect("statement should follow comment");
        let node = tree.get(id).unwrap();
        assert_eq!(node.kind, NodeKind::Stmt);
        assert_eq!(&text[node.span.start as usize..node.span.end as usize], "let x = 5;");
    }

    #[test]
    fn test_item_span_skips_doc_comments() {
        let text = "/// Docs.\n#[derive(Debug)]\npub struct S;\n";
        let tree = lower(text);

        let (_, item) = tree
            .preorder()
            .find(|(_, node)| node.kind == NodeKind::Item)
            .unwrap();
        assert_eq!(
            &text[item.span.start as usize..item.span.end as usize],
            "pub struct S;"
        );
    }

    #[test]
    fn test_node_at_returns_broadest() {
        let text = "fn main() {\n    foo(1);\n}\n";
        let tree = lower(text);
        let call = u32::try_from(text.find("foo").unwrap()).unwrap();

        assert_eq!(kind_at(&tree, tree.node_at(call)), Some(NodeKind::Stmt));
        assert_eq!(kind_at(&tree, tree.node_at(call + 1)), None);
    }

    #[test]
    fn test_first_after_none_past_last_token() {
        let text = "fn main() {}\n// trailing\n";
        let tree = lower(text);
        let comment = u32::try_from(text.find("// trailing").unwrap()).unwrap();

        assert_eq!(tree.first_after(comment), None);
    }

    fn expr_texts<'t>(tree: &SyntaxTree, text: &'t str) -> Vec<&'t str> {
        tree.preorder()
            .filter(|(_, node)| node.kind == NodeKind::Expr)
            .map(|(_, node)| &text[node.span.start as usize..node.span.end as usize])
            .collect()
    }

    #[test]
    fn test_postfix_chain_spans() {
        let text = "fn f() {\n    let v = (a.b(c)[0].d? + -x).e().await;\n}\n";
        let tree = lower(text);

        assert_eq!(
            expr_texts(&tree, text),
            vec![
                "(a.b(c)[0].d? + -x).e().await",
                "(a.b(c)[0].d? + -x).e()",
                "(a.b(c)[0].d? + -x)",
                "a.b(c)[0].d? + -x",
                "a.b(c)[0].d?",
                "a.b(c)[0].d",
                "a.b(c)[0]",
                "a.b(c)",
                "a",
                "c",
                "0",
                "-x",
                "x",
            ]
        );
    }

    #[test]
    fn test_long_operator_chain() {
        let terms = 200;
        let chain = vec!["1"; terms].join(" + ");
        let text = format!("fn f() -> u32 {{\n    #[allow(clippy::all)]\n    {chain}\n}}\n");
        let tree = lower(&text);

        let exprs = expr_texts(&tree, &text);
        assert_eq!(exprs.len(), 2 * terms - 1);
        assert_eq!(exprs[0], chain);
        assert!(exprs.iter().all(|e| e.starts_with('1') && e.ends_with('1')));

        let stmt = tree
            .preorder()
            .find(|(_, node)| node.kind == NodeKind::Stmt)
            .map(|(_, node)| &text[node.span.start as usize..node.span.end as usize]);
        assert_eq!(stmt, Some(chain.as_str()));
    }
}
