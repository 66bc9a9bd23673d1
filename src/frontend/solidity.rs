//! Solidity front end: parses with `solang_parser` and lowers the parse tree
//! into a [`SyntaxTree`]. Contracts become classes, functions become methods
//! and modifier invocations become annotations on them.

use crate::core::context::Artifact;
use crate::core::tree::{
    Annotation, BinaryOperator, Declaration, DeclarationKind, NodeId, NodeKind, ReadGuard, Role,
    SyntaxTree, TreeProvider,
};
use crate::utils::location::{line_starts, loc_to_range};
use rayon::prelude::*;
use solang_parser::helpers::CodeLocation;
use solang_parser::pt::{
    Base, CatchClause, Comment, ContractDefinition, ContractPart, ContractTy, Expression,
    FunctionAttribute, FunctionDefinition, FunctionTy, Import, ImportPath, Loc, Mutability,
    SourceUnit, SourceUnitPart, Statement, VariableAttribute, VariableDefinition, Visibility,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Free functions the compiler provides; calls to them resolve without a declaration.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "require",
    "assert",
    "revert",
    "keccak256",
    "sha256",
    "ripemd160",
    "ecrecover",
    "addmod",
    "mulmod",
    "blockhash",
    "gasleft",
    "selfdestruct",
];

#[derive(Debug, Clone)]
struct ContractSymbol {
    kind: &'static str,
    bases: Vec<String>,
}

/// Project-wide declarations, collected from every loaded source.
#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    contracts: HashMap<String, ContractSymbol>,
    functions: HashMap<String, Vec<Declaration>>,
    modifiers: HashMap<String, Declaration>,
    state_variables: HashMap<String, Declaration>,
}

impl SymbolIndex {
    pub fn from_unit(unit: &SourceUnit) -> Self {
        let mut index = Self::default();
        for part in &unit.0 {
            match part {
                SourceUnitPart::ContractDefinition(contract) => index.add_contract(contract),
                SourceUnitPart::FunctionDefinition(func) => {
                    if let Some(decl) = function_declaration(func, None, &[]) {
                        index.add_function(decl);
                    }
                }
                _ => {}
            }
        }
        index
    }

    fn add_contract(&mut self, contract: &ContractDefinition) {
        let Some(name) = contract.name.as_ref().map(|n| n.name.clone()) else {
            return;
        };
        let bases: Vec<String> = contract.base.iter().map(base_name).collect();

        for part in &contract.parts {
            match part {
                ContractPart::FunctionDefinition(func) if func.ty == FunctionTy::Modifier => {
                    if let Some(modifier) = &func.name {
                        let decl = Declaration::new(&modifier.name, DeclarationKind::AnnotationType)
                            .in_class(&name);
                        self.modifiers.insert(modifier.name.clone(), decl);
                    }
                }
                ContractPart::FunctionDefinition(func) => {
                    if let Some(decl) = function_declaration(func, Some(&name), &bases) {
                        self.add_function(decl);
                    }
                }
                ContractPart::VariableDefinition(var) => {
                    if let Some(var_name) = &var.name {
                        let decl = Declaration::new(&var_name.name, DeclarationKind::Field).in_class(&name);
                        self.state_variables.insert(var_name.name.clone(), decl);
                    }
                }
                _ => {}
            }
        }

        self.contracts.insert(
            name,
            ContractSymbol {
                kind: contract_kind(&contract.ty),
                bases,
            },
        );
    }

    fn add_function(&mut self, decl: Declaration) {
        self.functions.entry(decl.name.clone()).or_default().push(decl);
    }

    /// Folds `other` in; later sources win for contracts, modifiers and fields.
    pub fn merge(&mut self, other: SymbolIndex) {
        self.contracts.extend(other.contracts);
        self.modifiers.extend(other.modifiers);
        self.state_variables.extend(other.state_variables);
        for (name, decls) in other.functions {
            self.functions.entry(name).or_default().extend(decls);
        }
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_contract(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    /// `contract`, `abstract`, `interface` or `library`.
    pub fn contract_kind(&self, name: &str) -> Option<&'static str> {
        self.contracts.get(name).map(|c| c.kind)
    }
}

fn contract_kind(ty: &ContractTy) -> &'static str {
    match ty {
        ContractTy::Abstract(_) => "abstract",
        ContractTy::Contract(_) => "contract",
        ContractTy::Interface(_) => "interface",
        ContractTy::Library(_) => "library",
    }
}

fn base_name(base: &Base) -> String {
    base.name
        .identifiers
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn function_name(func: &FunctionDefinition) -> Option<String> {
    match func.ty {
        FunctionTy::Constructor => Some("constructor".to_string()),
        FunctionTy::Fallback => Some("fallback".to_string()),
        FunctionTy::Receive => Some("receive".to_string()),
        FunctionTy::Function | FunctionTy::Modifier => func.name.as_ref().map(|n| n.name.clone()),
    }
}

/// Modifier invocations on a function; base constructor calls are left out.
fn modifier_invocations<'f>(func: &'f FunctionDefinition, bases: &[String]) -> Vec<&'f Base> {
    func.attributes
        .iter()
        .filter_map(|attr| match attr {
            FunctionAttribute::BaseOrModifier(_, base) => Some(base),
            _ => None,
        })
        .filter(|base| !bases.contains(&base_name(base)))
        .collect()
}

fn function_declaration(
    func: &FunctionDefinition,
    contract: Option<&str>,
    bases: &[String],
) -> Option<Declaration> {
    let name = function_name(func)?;
    let mut decl = Declaration::new(&name, DeclarationKind::Method);
    if let Some(contract) = contract {
        decl = decl.in_class(contract);
    }
    for base in modifier_invocations(func, bases) {
        decl = decl.with_annotation(Annotation::new(&base_name(base)));
    }
    for (_, param) in &func.params {
        let param_name = param
            .as_ref()
            .and_then(|p| p.name.as_ref())
            .map(|n| n.name.as_str())
            .unwrap_or_default();
        decl = decl.with_parameter(param_name, Vec::new());
    }
    Some(decl)
}

fn parse_source(path: &Path, source: &str) -> Option<(SourceUnit, Vec<Comment>)> {
    match solang_parser::parse(source, 0) {
        Ok(parsed) => Some(parsed),
        Err(diagnostics) => {
            debug!(
                file = %path.display(),
                errors = diagnostics.len(),
                "Failed to parse Solidity source"
            );
            None
        }
    }
}

/// [`TreeProvider`] for Solidity sources.
#[derive(Debug, Default)]
pub struct SolidityProvider {
    sources: HashMap<PathBuf, String>,
    symbols: SymbolIndex,
    lock: RwLock<()>,
}

impl SolidityProvider {
    /// Reads and indexes `paths` in parallel. Unreadable files are skipped
    /// here and surface as parse errors once the engine reaches them.
    pub fn load(paths: &[PathBuf]) -> Self {
        let loaded: Vec<(PathBuf, String, SymbolIndex)> = paths
            .par_iter()
            .filter_map(|path| match fs::read_to_string(path) {
                Ok(source) => {
                    let index = parse_source(path, &source)
                        .map(|(unit, _)| SymbolIndex::from_unit(&unit))
                        .unwrap_or_default();
                    Some((path.clone(), source, index))
                }
                Err(e) => {
                    warn!(file = %path.display(), "Failed to read source: {}", e);
                    None
                }
            })
            .collect();

        let mut provider = Self::default();
        for (path, source, index) in loaded {
            provider.symbols.merge(index);
            provider.sources.insert(path, source);
        }
        debug!(
            files = provider.sources.len(),
            contracts = provider.symbols.contract_count(),
            "Indexed Solidity sources"
        );
        provider
    }

    /// Adds an in-memory source, indexing it like a loaded file.
    pub fn with_source(mut self, path: impl Into<PathBuf>, source: &str) -> Self {
        let path = path.into();
        if let Some((unit, _)) = parse_source(&path, source) {
            self.symbols.merge(SymbolIndex::from_unit(&unit));
        }
        self.sources.insert(path, source.to_string());
        self
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    fn source_of(&self, path: &Path) -> Option<String> {
        if let Some(source) = self.sources.get(path) {
            return Some(source.clone());
        }
        fs::read_to_string(path)
            .map_err(|e| debug!(file = %path.display(), "Failed to read source: {}", e))
            .ok()
    }

    fn resolve_call(&self, tree: &SyntaxTree, call: NodeId, name: &str) -> Option<Declaration> {
        if let Some(candidates) = self.symbols.functions.get(name) {
            let arity = tree.children_with_role(call, Role::Argument).count();
            let class = tree
                .enclosing(call, NodeKind::Class)
                .and_then(|c| tree.name(c))
                .map(str::to_string);
            let matching: Vec<&Declaration> = candidates
                .iter()
                .filter(|d| d.parameters.len() == arity)
                .collect();
            let pool: Vec<&Declaration> = if matching.is_empty() {
                candidates.iter().collect()
            } else {
                matching
            };
            let chosen = pool
                .iter()
                .find(|d| class.is_some() && d.containing_class == class)
                .or_else(|| pool.first());
            if let Some(decl) = chosen {
                return Some((*decl).clone());
            }
        }
        if self.symbols.is_contract(name) {
            return Some(Declaration::new(name, DeclarationKind::Class));
        }
        let is_member_call = tree.child_with_role(call, Role::Receiver).is_some();
        if is_member_call || BUILTIN_FUNCTIONS.contains(&name) {
            return Some(Declaration::new(name, DeclarationKind::Method));
        }
        None
    }

    fn resolve_reference(&self, tree: &SyntaxTree, node: NodeId, name: &str) -> Option<Declaration> {
        if let Some(method) = tree.enclosing(node, NodeKind::Method) {
            let local = tree.descendants(method).into_iter().find(|n| {
                matches!(tree.kind(*n), NodeKind::Parameter | NodeKind::Variable)
                    && tree.name(*n) == Some(name)
            });
            if let Some(local) = local {
                let kind = match tree.kind(local) {
                    NodeKind::Parameter => DeclarationKind::Parameter,
                    _ => DeclarationKind::Variable,
                };
                return Some(Declaration::new(name, kind));
            }
        }
        if let Some(field) = self.symbols.state_variables.get(name) {
            return Some(field.clone());
        }
        if self.symbols.is_contract(name) {
            return Some(Declaration::new(name, DeclarationKind::Class));
        }
        None
    }
}

impl TreeProvider for SolidityProvider {
    fn parse(&self, artifact: &Artifact) -> Option<SyntaxTree> {
        let source = self.source_of(&artifact.path)?;
        let (unit, comments) = parse_source(&artifact.path, &source)?;
        let mut lowerer = Lowerer::new(&artifact.path, &source);
        lowerer.source_unit(&unit);
        lowerer.comments(&comments);
        Some(lowerer.finish())
    }

    fn resolve(&self, tree: &SyntaxTree, node: NodeId) -> Option<Declaration> {
        let name = tree.name(node)?;
        match tree.kind(node) {
            NodeKind::Call => self.resolve_call(tree, node, name),
            NodeKind::Reference => self.resolve_reference(tree, node, name),
            NodeKind::Annotation => self.symbols.modifiers.get(name).cloned(),
            NodeKind::Class => Some(Declaration::new(name, DeclarationKind::Class)),
            NodeKind::Method => {
                let decl = Declaration::new(name, DeclarationKind::Method);
                match tree.enclosing(node, NodeKind::Class).and_then(|c| tree.name(c)) {
                    Some(class) => Some(decl.in_class(class)),
                    None => Some(decl),
                }
            }
            _ => None,
        }
    }

    fn super_types(&self, qualified_name: &str) -> Vec<String> {
        self.symbols
            .contracts
            .get(qualified_name)
            .map(|c| c.bases.clone())
            .unwrap_or_default()
    }

    fn read_lock(&self) -> ReadGuard<'_> {
        ReadGuard::hold(self.lock.read().unwrap_or_else(PoisonError::into_inner))
    }
}

struct Lowerer<'s> {
    tree: SyntaxTree,
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> Lowerer<'s> {
    fn new(path: &Path, source: &'s str) -> Self {
        Self {
            tree: SyntaxTree::new(path).with_source(source.to_string()),
            source,
            line_starts: line_starts(source),
        }
    }

    fn finish(self) -> SyntaxTree {
        self.tree
    }

    fn text(&self, loc: &Loc) -> Option<String> {
        match loc {
            Loc::File(_, start, end) => self.source.get(*start..*end).map(|s| s.trim().to_string()),
            _ => None,
        }
    }

    fn node(&mut self, parent: NodeId, kind: NodeKind, loc: &Loc, role: Option<Role>) -> NodeId {
        let id = self.tree.add(parent, kind);
        let range = loc_to_range(loc, &self.line_starts);
        let data = self.tree.node_mut(id);
        data.role = role;
        if let Some(range) = range {
            data.range = range;
        }
        id
    }

    fn named(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: &str,
        loc: &Loc,
        role: Option<Role>,
    ) -> NodeId {
        let id = self.node(parent, kind, loc, role);
        self.tree.node_mut(id).name = Some(name.to_string());
        id
    }

    fn comments(&mut self, comments: &[Comment]) {
        for comment in comments {
            let (Comment::Line(loc, text)
            | Comment::Block(loc, text)
            | Comment::DocLine(loc, text)
            | Comment::DocBlock(loc, text)) = comment;
            let Some(range) = loc_to_range(loc, &self.line_starts) else {
                continue;
            };
            self.tree.add_comment(range.start_line, text);
            if range.end_line != range.start_line {
                self.tree.add_comment(range.end_line, text);
            }
        }
    }

    fn source_unit(&mut self, unit: &SourceUnit) {
        let root = self.tree.root();
        for part in &unit.0 {
            match part {
                SourceUnitPart::ImportDirective(import) => self.import(root, import),
                SourceUnitPart::ContractDefinition(contract) => self.contract(root, contract),
                SourceUnitPart::FunctionDefinition(func) => self.function(root, func, &[]),
                SourceUnitPart::VariableDefinition(var) => self.variable(root, var),
                _ => {}
            }
        }
    }

    fn import(&mut self, parent: NodeId, import: &Import) {
        let (path, loc) = match import {
            Import::Plain(path, loc) => (path, loc),
            Import::GlobalSymbol(path, _, loc) => (path, loc),
            Import::Rename(path, _, loc) => (path, loc),
        };
        let name = match path {
            ImportPath::Filename(lit) => lit.string.clone(),
            ImportPath::Path(path) => path
                .identifiers
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join("."),
        };
        self.named(parent, NodeKind::Import, &name, loc, None);
    }

    fn contract(&mut self, parent: NodeId, contract: &ContractDefinition) {
        let name = contract
            .name
            .as_ref()
            .map(|n| n.name.clone())
            .unwrap_or_default();
        let class = self.named(parent, NodeKind::Class, &name, &contract.loc, None);
        self.tree
            .node_mut(class)
            .modifiers
            .push(contract_kind(&contract.ty).to_string());

        let bases: Vec<String> = contract.base.iter().map(base_name).collect();
        for base in &contract.base {
            for arg in base.args.iter().flatten() {
                self.expression(class, arg, None);
            }
        }
        for part in &contract.parts {
            match part {
                ContractPart::FunctionDefinition(func) => self.function(class, func, &bases),
                ContractPart::VariableDefinition(var) => self.variable(class, var),
                _ => {}
            }
        }
    }

    fn function(&mut self, parent: NodeId, func: &FunctionDefinition, bases: &[String]) {
        let name = function_name(func).unwrap_or_default();
        let method = self.named(parent, NodeKind::Method, &name, &func.loc, None);

        let keyword = match func.ty {
            FunctionTy::Constructor => "constructor",
            FunctionTy::Function => "function",
            FunctionTy::Fallback => "fallback",
            FunctionTy::Receive => "receive",
            FunctionTy::Modifier => "modifier",
        };
        let mut modifiers = vec![keyword.to_string()];
        for attr in &func.attributes {
            match attr {
                FunctionAttribute::Visibility(visibility) => {
                    modifiers.push(visibility_keyword(visibility).to_string())
                }
                FunctionAttribute::Mutability(mutability) => {
                    modifiers.push(mutability_keyword(mutability).to_string())
                }
                FunctionAttribute::Virtual(_) => modifiers.push("virtual".to_string()),
                FunctionAttribute::Override(..) => modifiers.push("override".to_string()),
                _ => {}
            }
        }
        self.tree.node_mut(method).modifiers = modifiers;

        for base in modifier_invocations(func, bases) {
            let annotation =
                self.named(method, NodeKind::Annotation, &base_name(base), &base.loc, None);
            let values: Vec<String> = base
                .args
                .iter()
                .flatten()
                .filter_map(|arg| self.text(&arg.loc()))
                .collect();
            self.tree.node_mut(annotation).values = values;
        }
        // Base constructor arguments are ordinary expressions
        for attr in &func.attributes {
            if let FunctionAttribute::BaseOrModifier(_, base) = attr {
                if bases.contains(&base_name(base)) {
                    for arg in base.args.iter().flatten() {
                        self.expression(method, arg, None);
                    }
                }
            }
        }

        for (loc, param) in &func.params {
            let Some(param) = param else {
                continue;
            };
            let param_name = param.name.as_ref().map(|n| n.name.as_str()).unwrap_or_default();
            let node = self.named(method, NodeKind::Parameter, param_name, loc, None);
            self.tree.node_mut(node).type_name = self.text(&param.ty.loc());
        }

        if let Some(body) = &func.body {
            self.statement(method, body, Some(Role::Body));
        }
    }

    fn variable(&mut self, parent: NodeId, var: &VariableDefinition) {
        let name = var.name.as_ref().map(|n| n.name.as_str()).unwrap_or_default();
        let field = self.named(parent, NodeKind::Field, name, &var.loc, None);
        let mut modifiers = Vec::new();
        for attr in &var.attrs {
            match attr {
                VariableAttribute::Visibility(visibility) => {
                    modifiers.push(visibility_keyword(visibility).to_string())
                }
                VariableAttribute::Constant(_) => modifiers.push("constant".to_string()),
                VariableAttribute::Immutable(_) => modifiers.push("immutable".to_string()),
                _ => {}
            }
        }
        let type_name = self.text(&var.ty.loc());
        let data = self.tree.node_mut(field);
        data.modifiers = modifiers;
        data.type_name = type_name;

        if let Some(init) = &var.initializer {
            self.expression(field, init, Some(Role::Initializer));
        }
    }

    fn statement(&mut self, parent: NodeId, stmt: &Statement, role: Option<Role>) {
        match stmt {
            Statement::Block {
                loc,
                unchecked,
                statements,
            } => {
                let block = self.node(parent, NodeKind::Block, loc, role);
                if *unchecked {
                    self.tree.node_mut(block).modifiers.push("unchecked".to_string());
                }
                for s in statements {
                    self.statement(block, s, None);
                }
            }
            Statement::If(loc, condition, then, otherwise) => {
                let node = self.node(parent, NodeKind::If, loc, role);
                self.expression(node, condition, Some(Role::Condition));
                self.statement(node, then, Some(Role::Body));
                if let Some(otherwise) = otherwise {
                    self.statement(node, otherwise, None);
                }
            }
            Statement::While(loc, condition, body) => {
                let node = self.loop_node(parent, "while", loc, role);
                self.expression(node, condition, Some(Role::Condition));
                self.statement(node, body, Some(Role::Body));
            }
            Statement::DoWhile(loc, body, condition) => {
                let node = self.loop_node(parent, "do", loc, role);
                self.statement(node, body, Some(Role::Body));
                self.expression(node, condition, Some(Role::Condition));
            }
            Statement::For(loc, init, condition, update, body) => {
                let node = self.loop_node(parent, "for", loc, role);
                if let Some(init) = init {
                    self.statement(node, init, None);
                }
                if let Some(condition) = condition {
                    self.expression(node, condition, Some(Role::Condition));
                }
                if let Some(update) = update {
                    self.expression(node, update, None);
                }
                if let Some(body) = body {
                    self.statement(node, body, Some(Role::Body));
                }
            }
            Statement::Expression(_, expr) => self.expression(parent, expr, role),
            Statement::VariableDefinition(loc, decl, init) => {
                let name = decl.name.as_ref().map(|n| n.name.as_str()).unwrap_or_default();
                let node = self.named(parent, NodeKind::Variable, name, loc, role);
                self.tree.node_mut(node).type_name = self.text(&decl.ty.loc());
                if let Some(init) = init {
                    self.expression(node, init, Some(Role::Initializer));
                }
            }
            Statement::Return(loc, value) => {
                let node = self.node(parent, NodeKind::Return, loc, role);
                if let Some(value) = value {
                    self.expression(node, value, Some(Role::Value));
                }
            }
            Statement::Emit(loc, expr) => {
                let node = self.named(parent, NodeKind::Other, "emit", loc, role);
                self.expression(node, expr, None);
            }
            Statement::Revert(loc, error, args) => {
                let node = self.named(parent, NodeKind::Call, "revert", loc, role);
                if let Some(error) = error {
                    if let Some(text) = self.text(&error.loc) {
                        self.tree.node_mut(node).values.push(text);
                    }
                }
                for arg in args {
                    self.expression(node, arg, Some(Role::Argument));
                }
            }
            Statement::RevertNamedArgs(loc, error, args) => {
                let node = self.named(parent, NodeKind::Call, "revert", loc, role);
                if let Some(error) = error {
                    if let Some(text) = self.text(&error.loc) {
                        self.tree.node_mut(node).values.push(text);
                    }
                }
                for arg in args {
                    self.expression(node, &arg.expr, Some(Role::Argument));
                }
            }
            Statement::Try(loc, expr, returns, catches) => {
                let node = self.named(parent, NodeKind::Other, "try", loc, role);
                self.expression(node, expr, None);
                if let Some((_, block)) = returns {
                    self.statement(node, block, Some(Role::Body));
                }
                for clause in catches {
                    match clause {
                        CatchClause::Simple(_, _, block) => self.statement(node, block, None),
                        CatchClause::Named(_, _, _, block) => self.statement(node, block, None),
                    }
                }
            }
            Statement::Continue(loc) => {
                self.named(parent, NodeKind::Other, "continue", loc, role);
            }
            Statement::Break(loc) => {
                self.named(parent, NodeKind::Other, "break", loc, role);
            }
            Statement::Assembly { loc, .. } => {
                self.named(parent, NodeKind::Other, "assembly", loc, role);
            }
            Statement::Args(_, args) => {
                for arg in args {
                    self.expression(parent, &arg.expr, None);
                }
            }
            Statement::Error(_) => {}
        }
    }

    fn loop_node(&mut self, parent: NodeId, keyword: &str, loc: &Loc, role: Option<Role>) -> NodeId {
        let node = self.node(parent, NodeKind::Loop, loc, role);
        self.tree.node_mut(node).modifiers.push(keyword.to_string());
        node
    }

    fn callee_name(&self, callee: &Expression) -> Option<String> {
        match callee {
            Expression::Variable(ident) => Some(ident.name.clone()),
            Expression::MemberAccess(_, _, member) => Some(member.name.clone()),
            Expression::FunctionCallBlock(_, inner, _)
            | Expression::Parenthesis(_, inner)
            | Expression::New(_, inner) => self.callee_name(inner),
            Expression::Type(loc, _) => self.text(loc),
            _ => None,
        }
    }

    /// Lowers the receiver and call options of a callee under `call`.
    fn callee_parts(&mut self, call: NodeId, callee: &Expression) {
        match callee {
            Expression::MemberAccess(_, object, _) => {
                self.expression(call, object, Some(Role::Receiver))
            }
            Expression::FunctionCallBlock(_, inner, block) => {
                self.callee_parts(call, inner);
                self.statement(call, block, None);
            }
            Expression::Parenthesis(_, inner) => self.callee_parts(call, inner),
            Expression::New(..) => self.tree.node_mut(call).modifiers.push("new".to_string()),
            _ => {}
        }
    }

    fn call(&mut self, parent: NodeId, loc: &Loc, callee: &Expression, role: Option<Role>) -> NodeId {
        let name = self.callee_name(callee);
        let call = self.node(parent, NodeKind::Call, loc, role);
        self.tree.node_mut(call).name = name;
        self.callee_parts(call, callee);
        call
    }

    fn binary(
        &mut self,
        parent: NodeId,
        loc: &Loc,
        operator: BinaryOperator,
        operands: (&Expression, &Expression),
        role: Option<Role>,
    ) {
        let node = self.node(parent, NodeKind::Binary, loc, role);
        self.tree.node_mut(node).operator = Some(operator);
        self.expression(node, operands.0, Some(Role::Left));
        self.expression(node, operands.1, Some(Role::Right));
    }

    fn assignment(
        &mut self,
        parent: NodeId,
        loc: &Loc,
        target: &Expression,
        value: &Expression,
        role: Option<Role>,
    ) {
        let node = self.node(parent, NodeKind::Assignment, loc, role);
        self.expression(node, target, Some(Role::Left));
        self.expression(node, value, Some(Role::Right));
    }

    fn unary(&mut self, parent: NodeId, loc: &Loc, operand: &Expression, role: Option<Role>) {
        let node = self.node(parent, NodeKind::Unary, loc, role);
        self.expression(node, operand, None);
    }

    fn literal(&mut self, parent: NodeId, expr: &Expression, role: Option<Role>) {
        let loc = expr.loc();
        let text = self.text(&loc).unwrap_or_default();
        self.named(parent, NodeKind::Literal, &text, &loc, role);
    }

    fn expression(&mut self, parent: NodeId, expr: &Expression, role: Option<Role>) {
        use BinaryOperator::{Arithmetic, Comparison, Equals, Logical, NotEquals};

        match expr {
            Expression::Parenthesis(_, inner) => self.expression(parent, inner, role),

            Expression::FunctionCall(loc, callee, args) => {
                let call = self.call(parent, loc, callee, role);
                for arg in args {
                    self.expression(call, arg, Some(Role::Argument));
                }
            }
            Expression::NamedFunctionCall(loc, callee, args) => {
                let call = self.call(parent, loc, callee, role);
                for arg in args {
                    self.expression(call, &arg.expr, Some(Role::Argument));
                }
            }
            Expression::FunctionCallBlock(loc, callee, block) => {
                let node = self.named(parent, NodeKind::Other, "{}", loc, role);
                self.expression(node, callee, Some(Role::Receiver));
                self.statement(node, block, None);
            }
            Expression::MemberAccess(loc, object, member) => {
                let node = self.named(parent, NodeKind::MemberAccess, &member.name, loc, role);
                self.expression(node, object, Some(Role::Receiver));
            }
            Expression::Variable(ident) => {
                self.named(parent, NodeKind::Reference, &ident.name, &ident.loc, role);
            }

            Expression::Equal(loc, l, r) => self.binary(parent, loc, Equals, (l, r), role),
            Expression::NotEqual(loc, l, r) => self.binary(parent, loc, NotEquals, (l, r), role),
            Expression::Less(loc, l, r)
            | Expression::More(loc, l, r)
            | Expression::LessEqual(loc, l, r)
            | Expression::MoreEqual(loc, l, r) => {
                self.binary(parent, loc, Comparison, (l, r), role)
            }
            Expression::And(loc, l, r) | Expression::Or(loc, l, r) => {
                self.binary(parent, loc, Logical, (l, r), role)
            }
            Expression::Power(loc, l, r)
            | Expression::Multiply(loc, l, r)
            | Expression::Divide(loc, l, r)
            | Expression::Modulo(loc, l, r)
            | Expression::Add(loc, l, r)
            | Expression::Subtract(loc, l, r)
            | Expression::ShiftLeft(loc, l, r)
            | Expression::ShiftRight(loc, l, r)
            | Expression::BitwiseAnd(loc, l, r)
            | Expression::BitwiseXor(loc, l, r)
            | Expression::BitwiseOr(loc, l, r) => {
                self.binary(parent, loc, Arithmetic, (l, r), role)
            }

            Expression::Assign(loc, l, r)
            | Expression::AssignOr(loc, l, r)
            | Expression::AssignAnd(loc, l, r)
            | Expression::AssignXor(loc, l, r)
            | Expression::AssignShiftLeft(loc, l, r)
            | Expression::AssignShiftRight(loc, l, r)
            | Expression::AssignAdd(loc, l, r)
            | Expression::AssignSubtract(loc, l, r)
            | Expression::AssignMultiply(loc, l, r)
            | Expression::AssignDivide(loc, l, r)
            | Expression::AssignModulo(loc, l, r) => self.assignment(parent, loc, l, r, role),

            Expression::PostIncrement(loc, e)
            | Expression::PostDecrement(loc, e)
            | Expression::PreIncrement(loc, e)
            | Expression::PreDecrement(loc, e)
            | Expression::UnaryPlus(loc, e)
            | Expression::Negate(loc, e)
            | Expression::Not(loc, e)
            | Expression::BitwiseNot(loc, e)
            | Expression::Delete(loc, e) => self.unary(parent, loc, e, role),

            Expression::New(loc, e) => {
                let node = self.named(parent, NodeKind::Other, "new", loc, role);
                self.expression(node, e, None);
            }
            Expression::ConditionalOperator(loc, condition, then, otherwise) => {
                let node = self.named(parent, NodeKind::Other, "?:", loc, role);
                self.expression(node, condition, Some(Role::Condition));
                self.expression(node, then, None);
                self.expression(node, otherwise, None);
            }
            Expression::ArraySubscript(loc, array, index) => {
                let node = self.named(parent, NodeKind::Other, "[]", loc, role);
                self.expression(node, array, Some(Role::Receiver));
                if let Some(index) = index {
                    self.expression(node, index, None);
                }
            }
            Expression::ArraySlice(loc, array, start, end) => {
                let node = self.named(parent, NodeKind::Other, "[:]", loc, role);
                self.expression(node, array, Some(Role::Receiver));
                for bound in [start, end].into_iter().flatten() {
                    self.expression(node, bound, None);
                }
            }
            Expression::ArrayLiteral(loc, items) => {
                let node = self.named(parent, NodeKind::Other, "[]", loc, role);
                for item in items {
                    self.expression(node, item, None);
                }
            }
            Expression::List(loc, params) => {
                let node = self.named(parent, NodeKind::Other, "()", loc, role);
                for (param_loc, param) in params {
                    let Some(param) = param else {
                        continue;
                    };
                    match &param.name {
                        Some(name) => {
                            let var = self.named(node, NodeKind::Variable, &name.name, param_loc, None);
                            self.tree.node_mut(var).type_name = self.text(&param.ty.loc());
                        }
                        None => self.expression(node, &param.ty, None),
                    }
                }
            }
            Expression::Type(loc, _) => {
                let text = self.text(loc).unwrap_or_default();
                self.named(parent, NodeKind::Other, &text, loc, role);
            }

            Expression::BoolLiteral(..)
            | Expression::NumberLiteral(..)
            | Expression::RationalNumberLiteral(..)
            | Expression::HexNumberLiteral(..)
            | Expression::StringLiteral(..)
            | Expression::HexLiteral(..)
            | Expression::AddressLiteral(..) => self.literal(parent, expr, role),
        }
    }
}

fn visibility_keyword(visibility: &Visibility) -> &'static str {
    match visibility {
        Visibility::External(_) => "external",
        Visibility::Public(_) => "public",
        Visibility::Internal(_) => "internal",
        Visibility::Private(_) => "private",
    }
}

fn mutability_keyword(mutability: &Mutability) -> &'static str {
    match mutability {
        Mutability::Pure(_) => "pure",
        Mutability::View(_) => "view",
        Mutability::Constant(_) => "constant",
        Mutability::Payable(_) => "payable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ArtifactKind;

    const VAULT: &str = r#"
import "./Ownable.sol";

contract Vault is Ownable {
    uint256 public total;

    modifier onlyAdmin(uint256 level) {
        _;
    }

    function deposit(uint256 amount) external onlyAdmin(2) {
        // noinspection TxOriginUsage
        require(tx.origin == owner);
        total += amount;
        _credit(amount);
    }

    function _credit(uint256 amount) internal {
        for (uint256 i = 0; i < amount; i++) {
            total = total + 1;
        }
    }
}
"#;

    fn lower(code: &str) -> (SolidityProvider, SyntaxTree) {
        let provider = SolidityProvider::default().with_source("Vault.sol", code);
        let tree = provider
            .parse(&Artifact::new("Vault.sol", ArtifactKind::Source))
            .expect("parses");
        (provider, tree)
    }

    fn find(tree: &SyntaxTree, kind: NodeKind, name: &str) -> NodeId {
        tree.descendants(tree.root())
            .into_iter()
            .find(|n| tree.kind(*n) == kind && tree.name(*n) == Some(name))
            .unwrap_or_else(|| panic!("no {:?} named {}", kind, name))
    }

    #[test]
    fn test_lowers_contract_shape() {
        let (_, tree) = lower(VAULT);
        let import = find(&tree, NodeKind::Import, "./Ownable.sol");
        assert_eq!(tree.range(import).start_line, 2);

        let class = find(&tree, NodeKind::Class, "Vault");
        assert!(tree.node(class).has_modifier("contract"));
        assert_eq!(tree.range(class).start_line, 4);

        let deposit = find(&tree, NodeKind::Method, "deposit");
        assert!(tree.node(deposit).has_modifier("external"));
        let annotations: Vec<NodeId> = tree.annotations(deposit).collect();
        assert_eq!(annotations.len(), 1);
        assert_eq!(tree.name(annotations[0]), Some("onlyAdmin"));
        assert_eq!(tree.node(annotations[0]).values, vec!["2".to_string()]);

        let param = find(&tree, NodeKind::Parameter, "amount");
        assert_eq!(tree.node(param).type_name.as_deref(), Some("uint256"));

        let field = find(&tree, NodeKind::Field, "total");
        assert!(tree.node(field).has_modifier("public"));
    }

    #[test]
    fn test_lowers_expressions_with_roles() {
        let (_, tree) = lower(VAULT);
        let origin = find(&tree, NodeKind::MemberAccess, "origin");
        let receiver = tree.child_with_role(origin, Role::Receiver).expect("receiver");
        assert_eq!(tree.name(receiver), Some("tx"));
        assert_eq!(tree.role(origin), Some(Role::Left));
        let equality = tree.parent(origin).expect("parent");
        assert_eq!(tree.node(equality).operator, Some(BinaryOperator::Equals));

        let require = find(&tree, NodeKind::Call, "require");
        assert_eq!(tree.children_with_role(require, Role::Argument).count(), 1);
        assert_eq!(tree.range(require).start_line, 13);

        let credit = find(&tree, NodeKind::Method, "_credit");
        let loops: Vec<NodeId> = tree
            .descendants(credit)
            .into_iter()
            .filter(|n| tree.kind(*n) == NodeKind::Loop)
            .collect();
        assert_eq!(loops.len(), 1);
        assert!(tree.node(loops[0]).has_modifier("for"));
        assert!(tree.child_with_role(loops[0], Role::Condition).is_some());
    }

    #[test]
    fn test_comments_keep_their_line() {
        let (_, tree) = lower(VAULT);
        let comment = tree.comments_on_line(12).next().expect("comment");
        assert!(comment.text.contains("noinspection TxOriginUsage"));
    }

    #[test]
    fn test_resolves_calls_and_references() {
        let (provider, tree) = lower(VAULT);
        let credit_call = find(&tree, NodeKind::Call, "_credit");
        let decl = provider.resolve(&tree, credit_call).expect("resolved");
        assert_eq!(decl.kind, DeclarationKind::Method);
        assert_eq!(decl.qualified_name, "Vault._credit");
        assert_eq!(decl.parameters.len(), 1);

        let require = find(&tree, NodeKind::Call, "require");
        assert!(provider.resolve(&tree, require).is_some());

        let deposit = find(&tree, NodeKind::Method, "deposit");
        let amount_ref = tree
            .descendants(deposit)
            .into_iter()
            .find(|n| tree.kind(*n) == NodeKind::Reference && tree.name(*n) == Some("amount"))
            .expect("reference");
        let decl = provider.resolve(&tree, amount_ref).expect("resolved");
        assert_eq!(decl.kind, DeclarationKind::Parameter);

        let total_ref = find(&tree, NodeKind::Reference, "total");
        let decl = provider.resolve(&tree, total_ref).expect("resolved");
        assert_eq!(decl.kind, DeclarationKind::Field);
        assert_eq!(decl.qualified_name, "Vault.total");

        let owner_ref = find(&tree, NodeKind::Reference, "owner");
        assert!(provider.resolve(&tree, owner_ref).is_none());
    }

    #[test]
    fn test_function_declarations_carry_modifiers() {
        let provider = SolidityProvider::default().with_source("Vault.sol", VAULT);
        let deposit = &provider.symbols().functions["deposit"][0];
        assert_eq!(deposit.annotations, vec![Annotation::new("onlyAdmin")]);
        assert_eq!(provider.super_types("Vault"), vec!["Ownable".to_string()]);
        assert_eq!(provider.symbols().contract_kind("Vault"), Some("contract"));
        assert!(provider.super_types("Ownable").is_empty());
    }

    #[test]
    fn test_base_constructor_is_not_an_annotation() {
        let code = r#"
contract Token is ERC20 {
    constructor() ERC20("T", "T") {}
}
"#;
        let (_, tree) = lower(code);
        let ctor = find(&tree, NodeKind::Method, "constructor");
        assert_eq!(tree.annotations(ctor).count(), 0);
    }

    #[test]
    fn test_unparsable_source_gives_none() {
        let provider = SolidityProvider::default().with_source("Bad.sol", "contract {");
        assert!(provider
            .parse(&Artifact::new("Bad.sol", ArtifactKind::Source))
            .is_none());
    }
}
