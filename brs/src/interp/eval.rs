//! Tree-walking statement executor and expression evaluator

use super::callable::{Argument, Callable, Implementation, Signature};
use super::coercion::try_coerce;
use super::collections::{MAX_ARRAY_LENGTH, RoArray, RoAssociativeArray};
use super::component::{HeapStats, MethodSpec, ObjRef};
use super::context::RuntimeContext;
use super::env::{Environment, Scope};
use super::error::{EndReason, ErrorKind, InterpResult, RuntimeError, Signal, TracePoint};
use super::operators;
use super::stdlib::register_stdlib;
use super::value::Value;
use crate::ast::{
    BinaryOp, Block, Expr, Expression, FunctionExpr, Identifier, Location, PrintItem, Statement,
    Stmt, ValueKind, block_contains_label, statement_contains_label,
};
use crate::extensions::BrsExtension;
use crate::task::message::HostMessage;
use std::rc::Rc;
use std::sync::Arc;

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Width of a `print` zone
const PRINT_ZONE: usize = 16;

pub const NO_ENTRY_POINT_WARNING: &str =
    "WARNING! No entry point found! You must define a function Main() or RunUserInterface()";

/// How a statement or block completed
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Option<Value>),
    Goto(String),
    ExitFor,
    ExitWhile,
    ContinueFor,
    ContinueWhile,
}

/// The interpreter
pub struct Interpreter {
    pub(super) env: Environment,
    pub(super) context: RuntimeContext,
    /// One trace point per active user-function call, outermost first
    pub(super) stack: Vec<TracePoint>,
    /// Components produced while evaluating the current statements
    temporaries: Vec<ObjRef>,
    /// Label a `goto` is searching for
    goto_target: Option<String>,
    extensions: Vec<Box<dyn BrsExtension>>,
    pub(super) current_loc: Location,
    /// Statement that ran before `current_loc`
    pub(super) last_loc: Location,
    /// Pause again before the next statement
    pub(super) step_mode: bool,
    print_column: usize,
}

impl Interpreter {
    pub fn new(context: RuntimeContext) -> Self {
        let root_m = RoAssociativeArray::create(&context.heap, Vec::new());
        root_m.add_reference();
        let mut env = Environment::new(root_m);
        register_stdlib(&mut env);
        Interpreter {
            env,
            context,
            stack: Vec::new(),
            temporaries: Vec::new(),
            goto_target: None,
            extensions: Vec::new(),
            current_loc: Location::internal(),
            last_loc: Location::internal(),
            step_mode: false,
            print_column: 0,
        }
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    pub fn heap(&self) -> &Rc<HeapStats> {
        &self.context.heap
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Location of the statement being executed
    pub fn current_location(&self) -> &Location {
        &self.current_loc
    }

    /// Active user-function calls, outermost first
    pub fn call_stack(&self) -> &[TracePoint] {
        &self.stack
    }

    /// Post a warning to the host
    pub fn warn(&self, text: &str) {
        log::warn!("{text}");
        self.context.post(HostMessage::Warning(text.to_string()));
    }

    /// Attach an extension; its `on_init` hook runs immediately
    pub fn add_extension(&mut self, mut extension: Box<dyn BrsExtension>) {
        log::debug!("initializing extension {}", extension.name());
        extension.on_init(self);
        self.extensions.push(extension);
    }

    /// Run `hook` on every attached extension, lending it the interpreter
    pub fn for_each_extension<F>(&mut self, mut hook: F) -> InterpResult<()>
    where
        F: FnMut(&mut dyn BrsExtension, &mut Interpreter) -> InterpResult<()>,
    {
        if self.extensions.is_empty() {
            return Ok(());
        }
        let mut extensions = std::mem::take(&mut self.extensions);
        let result = extensions
            .iter_mut()
            .try_for_each(|ext| hook(ext.as_mut(), self));
        extensions.append(&mut self.extensions);
        self.extensions = extensions;
        result
    }

    // ============================================
    // Program entry
    // ============================================

    /// Run a parsed program: declare its functions, run top-level statements,
    /// then call the first entry point found
    pub fn exec(&mut self, statements: &[Statement], input_params: Option<Value>) -> InterpResult<Value> {
        self.for_each_extension(|ext, interp| {
            ext.on_before_execute(interp);
            Ok(())
        })?;

        let mark = self.temporaries.len();
        if let Some(params) = &input_params {
            self.track(params);
        }
        let result = self.exec_entry(statements, input_params);
        self.release_temporaries(mark);
        result
    }

    fn exec_entry(&mut self, statements: &[Statement], input_params: Option<Value>) -> InterpResult<Value> {
        let has_top_level = self.run_statements(statements)?;
        let Some(entry) = self.find_entry_point() else {
            if !has_top_level && self.context.options.warn_missing_entry {
                self.warn(NO_ENTRY_POINT_WARNING);
            }
            return Ok(Value::Invalid);
        };
        log::debug!("calling entry point {}", entry.name());
        let takes_params = entry
            .signatures()
            .first()
            .is_some_and(|s| !s.signature.args.is_empty());
        let args = match input_params {
            Some(params) if takes_params => vec![params],
            _ => Vec::new(),
        };
        let loc = entry.location().cloned().unwrap_or_else(Location::internal);
        self.context
            .post(HostMessage::Start(entry.name().to_ascii_lowercase()));
        let result = self.call_callable(&entry, args, &loc, None)?;
        self.track(&result);
        Ok(result)
    }

    /// Declare every function in `statements`, then run the remaining
    /// top-level statements in order. Returns whether any were run.
    pub fn run_statements(&mut self, statements: &[Statement]) -> InterpResult<bool> {
        for stmt in statements {
            if let Stmt::Function { name, func } = &stmt.node {
                self.declare_function(name, func)
                    .map_err(|e| e.at(&stmt.loc))?;
            }
        }
        let has_top_level = statements
            .iter()
            .any(|s| !matches!(s.node, Stmt::Function { .. }));
        if has_top_level {
            let flow = self.run_body(statements)?;
            stray_flow_error(&flow)?;
        }
        Ok(has_top_level)
    }

    fn declare_function(&mut self, name: &Identifier, func: &Arc<FunctionExpr>) -> Result<(), RuntimeError> {
        let callable = Callable::user(Some(&name.text), Arc::clone(func));
        self.env.define(
            Scope::Module,
            &name.text,
            Value::Callable(Rc::new(callable)),
            Some(&name.loc),
        )
    }

    fn find_entry_point(&self) -> Option<Rc<Callable>> {
        self.context.options.entry_points.iter().find_map(|name| {
            if !self.env.has(name, Some(&[Scope::Module])) {
                return None;
            }
            match self.env.get(name) {
                Ok(Value::Callable(callable)) => Some(callable),
                _ => None,
            }
        })
    }

    /// Release everything the interpreter still owns; call once execution is over
    pub fn release_all(&mut self) {
        self.release_temporaries(0);
        self.env.remove_references();
        self.env.root_m().remove_reference();
        log::debug!("{}", self.context.heap.summary());
    }

    // ============================================
    // Temporaries
    // ============================================

    /// Remember a freshly produced component so it can be disposed if nothing claims it
    fn track(&mut self, value: &Value) {
        if let Some(obj) = value.as_object() {
            self.temporaries.push(Rc::clone(obj));
        }
    }

    fn release_temporaries(&mut self, mark: usize) {
        let mark = mark.min(self.temporaries.len());
        let released: Vec<ObjRef> = self.temporaries.drain(mark..).collect();
        released.iter().for_each(|obj| obj.release_if_unowned());
    }

    // ============================================
    // Statements
    // ============================================

    /// Run a function body, restarting it whenever a `goto` leaves it
    fn run_body(&mut self, body: &[Statement]) -> InterpResult<Flow> {
        loop {
            match self.execute_block(body)? {
                Flow::Goto(label) => self.goto_target = Some(label),
                flow => {
                    if let Some(label) = self.goto_target.take() {
                        return Err(RuntimeError::missing_label(&label).into());
                    }
                    return Ok(flow);
                }
            }
        }
    }

    pub fn execute_block(&mut self, block: &[Statement]) -> InterpResult<Flow> {
        for stmt in block {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub fn execute(&mut self, stmt: &Statement) -> InterpResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let mark = self.temporaries.len();
            let result = self
                .before_statement(stmt)
                .and_then(|()| match self.goto_target.clone() {
                    Some(label) => self.seek(stmt, &label),
                    None => self.execute_inner(stmt),
                })
                .map_err(|signal| signal.at(&stmt.loc));
            self.release_temporaries(mark);
            result
        })
    }

    fn before_statement(&mut self, stmt: &Statement) -> InterpResult<()> {
        self.last_loc = std::mem::replace(&mut self.current_loc, stmt.loc.clone());
        self.env.set_current_line(stmt.loc.start.line);
        self.checkpoint()
    }

    /// Debugger and extension hooks; runs before each statement and on every
    /// loop pass, so loops with empty bodies stay interruptible
    fn checkpoint(&mut self) -> InterpResult<()> {
        self.poll_debugger()?;
        self.for_each_extension(|ext, interp| ext.tick(interp))
    }

    /// Execute only what leads to `label`
    fn seek(&mut self, stmt: &Statement, label: &str) -> InterpResult<Flow> {
        match &stmt.node {
            Stmt::Label { name } if name.key() == label => {
                self.goto_target = None;
                Ok(Flow::Normal)
            }
            _ if !statement_contains_label(stmt, label) => Ok(Flow::Normal),
            Stmt::If {
                then_branch,
                else_ifs,
                else_branch,
                ..
            } => {
                if block_contains_label(then_branch, label) {
                    return self.execute_block(then_branch);
                }
                if let Some(arm) = else_ifs
                    .iter()
                    .find(|arm| block_contains_label(&arm.then_branch, label))
                {
                    return self.execute_block(&arm.then_branch);
                }
                match else_branch {
                    Some(block) => self.execute_block(block),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::For {
                counter,
                start,
                end,
                step,
                body,
            } => self.execute_for(counter, start, end, step.as_ref(), body, true),
            Stmt::ForEach { item, target, body } => self.execute_for_each(item, target, body),
            Stmt::While { condition, body } => self.execute_while(condition, body, true),
            Stmt::TryCatch {
                try_block,
                error_binding,
                catch_block,
            } => {
                if block_contains_label(try_block, label) {
                    self.execute_try(try_block, error_binding, catch_block)
                } else {
                    self.execute_block(catch_block)
                }
            }
            _ => Ok(Flow::Normal),
        }
    }

    fn execute_inner(&mut self, stmt: &Statement) -> InterpResult<Flow> {
        match &stmt.node {
            Stmt::Assignment { name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(name, value)?;
                Ok(Flow::Normal)
            }
            Stmt::Dim { name, dimensions } => {
                self.execute_dim(name, dimensions)?;
                Ok(Flow::Normal)
            }
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::ExitFor => Ok(Flow::ExitFor),
            Stmt::ExitWhile => Ok(Flow::ExitWhile),
            Stmt::ContinueFor => Ok(Flow::ContinueFor),
            Stmt::ContinueWhile => Ok(Flow::ContinueWhile),
            Stmt::Function { name, func } => {
                self.declare_function(name, func)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                condition,
                then_branch,
                else_ifs,
                else_branch,
            } => {
                if self.condition(condition)? {
                    return self.execute_block(then_branch);
                }
                for arm in else_ifs {
                    if self.condition(&arm.condition)? {
                        return self.execute_block(&arm.then_branch);
                    }
                }
                match else_branch {
                    Some(block) => self.execute_block(block),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::Increment { target, decrement } => {
                let current = self.evaluate(target)?;
                let op = if *decrement { BinaryOp::Sub } else { BinaryOp::Add };
                let updated = operators::binary(op, &current, &Value::Int32(1))?;
                self.assign_to(target, updated)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { items } => {
                self.print(items)?;
                Ok(Flow::Normal)
            }
            Stmt::Goto { label } => Ok(Flow::Goto(label.key())),
            Stmt::Label { .. } => Ok(Flow::Normal),
            Stmt::Return { value } => {
                let value = match value {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        if let Some(obj) = value.as_object() {
                            obj.set_return(true);
                        }
                        Some(value)
                    }
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::End => Err(Signal::End(EndReason::EndStatement)),
            Stmt::Stop => {
                self.stop()?;
                Ok(Flow::Normal)
            }
            Stmt::For {
                counter,
                start,
                end,
                step,
                body,
            } => self.execute_for(counter, start, end, step.as_ref(), body, false),
            Stmt::ForEach { item, target, body } => self.execute_for_each(item, target, body),
            Stmt::While { condition, body } => self.execute_while(condition, body, false),
            Stmt::DottedSet { obj, name, value } => {
                let target = self.evaluate(obj)?;
                let value = self.evaluate(value)?;
                set_dotted(&target, name, value)?;
                Ok(Flow::Normal)
            }
            Stmt::IndexedSet { obj, index, value } => {
                let target = self.evaluate(obj)?;
                let index = self.evaluate(index)?;
                let value = self.evaluate(value)?;
                set_indexed(&target, &index, value)?;
                Ok(Flow::Normal)
            }
            Stmt::TryCatch {
                try_block,
                error_binding,
                catch_block,
            } => self.execute_try(try_block, error_binding, catch_block),
            Stmt::Throw { value } => {
                let value = self.evaluate(value)?;
                Err(thrown_error(&value).into())
            }
        }
    }

    /// Bind a Function-scope variable, honoring its type designator
    fn assign_variable(&mut self, name: &Identifier, value: Value) -> InterpResult<()> {
        let value = match ValueKind::from_designator(&name.text) {
            Some(kind) => try_coerce(&value, kind)
                .ok_or_else(|| RuntimeError::cast(value.kind().name(), kind.name()))?,
            None => value,
        };
        self.env
            .define(Scope::Function, &name.text, value, Some(&name.loc))?;
        Ok(())
    }

    /// Store into whatever `target` designates
    fn assign_to(&mut self, target: &Expression, value: Value) -> InterpResult<()> {
        match &target.node {
            Expr::Variable(name) => self.assign_variable(name, value),
            Expr::DottedGet { obj, name, .. } => {
                let obj = self.evaluate(obj)?;
                Ok(set_dotted(&obj, name, value)?)
            }
            Expr::IndexedGet { obj, index, .. } => {
                let obj = self.evaluate(obj)?;
                let index = self.evaluate(index)?;
                Ok(set_indexed(&obj, &index, value)?)
            }
            _ => Err(RuntimeError::from_kind(ErrorKind::BadLHS).into()),
        }
    }

    /// `dim a[n, m]`: nested arrays sized by each max index + 1
    fn execute_dim(&mut self, name: &Identifier, dimensions: &[Expression]) -> InterpResult<()> {
        let mut sizes = Vec::with_capacity(dimensions.len());
        for expr in dimensions {
            let value = self.evaluate(expr)?;
            let max_index = match value {
                Value::Float(x) => x.trunc() as i64,
                Value::Double(x) => x.trunc() as i64,
                other => other.as_i64().ok_or_else(|| {
                    RuntimeError::type_mismatch(&format!(
                        "Array dimensions must be numeric, but received {}.",
                        other.kind()
                    ))
                })?,
            };
            let size = match max_index.checked_add(1) {
                Some(length) if length <= 0 => 0,
                Some(length) => usize::try_from(length)
                    .ok()
                    .filter(|&length| length <= MAX_ARRAY_LENGTH)
                    .ok_or_else(RuntimeError::index_out_of_bounds)?,
                None => return Err(RuntimeError::index_out_of_bounds().at(&expr.loc).into()),
            };
            sizes.push(size);
        }
        let nested = sizes
            .split_last()
            .map(|(_, outer)| outer)
            .unwrap_or_default()
            .iter()
            .try_fold(1usize, |total, &size| total.checked_mul(size.max(1)))
            .filter(|&total| total <= MAX_ARRAY_LENGTH);
        if nested.is_none() {
            return Err(RuntimeError::index_out_of_bounds().at(&name.loc).into());
        }
        let array = build_dimensions(&self.context.heap, &sizes);
        self.env
            .define(Scope::Function, &name.text, Value::Object(array), Some(&name.loc))?;
        Ok(())
    }

    fn condition(&mut self, expr: &Expression) -> InterpResult<bool> {
        let value = self.evaluate(expr)?;
        value.as_condition().ok_or_else(|| {
            RuntimeError::type_mismatch(&format!(
                "Conditional expression must evaluate to a Boolean, but received {}.",
                value.kind()
            ))
            .at(&expr.loc)
            .into()
        })
    }

    fn execute_for(
        &mut self,
        counter: &Identifier,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        body: &Block,
        seeking: bool,
    ) -> InterpResult<Flow> {
        if !seeking {
            let initial = self.evaluate(start)?;
            self.assign_variable(counter, initial)?;
        }
        let end_value = self.evaluate(end)?;
        let step_value = match step {
            Some(expr) => self.evaluate(expr)?,
            None => Value::Int32(1),
        };
        // Fractional steps count in whole units
        let step_value = match step_value {
            Value::Float(x) => Value::Int32(operators::truncate_to_int32(f64::from(x))),
            Value::Double(x) => Value::Int32(operators::truncate_to_int32(x)),
            other => other,
        };
        let Some(increment) = step_value.as_f64() else {
            return Err(RuntimeError::cast(step_value.kind().name(), "Integer").at(&counter.loc).into());
        };
        let test = if increment > 0.0 { BinaryOp::LtEq } else { BinaryOp::GtEq };

        let mut skip_test = seeking;
        loop {
            if !skip_test {
                let current = self.env.get(&counter.text).unwrap_or(Value::Uninitialized);
                let keep_going = operators::binary(test, &current, &end_value)?;
                if keep_going != Value::Boolean(true) {
                    break;
                }
            }
            skip_test = false;
            self.checkpoint()?;
            match self.execute_block(body)? {
                Flow::Normal | Flow::ContinueFor => {}
                Flow::ExitFor => break,
                flow => return Ok(flow),
            }
            let current = self.env.get(&counter.text).unwrap_or(Value::Uninitialized);
            let next = operators::binary(BinaryOp::Add, &current, &step_value)?;
            self.assign_variable(counter, next)?;
        }
        Ok(Flow::Normal)
    }

    fn execute_for_each(&mut self, item: &Identifier, target: &Expression, body: &Block) -> InterpResult<Flow> {
        let source = self.evaluate(target)?;
        let Some(items) = source.as_object().and_then(|obj| obj.elements()) else {
            return Err(RuntimeError::type_mismatch(&format!(
                "Attempting to iterate across values of non-iterable type {}.",
                source.kind()
            ))
            .at(&target.loc)
            .into());
        };
        for value in items {
            self.assign_variable(item, value)?;
            self.checkpoint()?;
            match self.execute_block(body)? {
                Flow::Normal | Flow::ContinueFor => {}
                Flow::ExitFor => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_while(&mut self, condition: &Expression, body: &Block, seeking: bool) -> InterpResult<Flow> {
        let mut skip_test = seeking;
        loop {
            if !skip_test {
                let mark = self.temporaries.len();
                let keep_going = self.condition(condition);
                self.release_temporaries(mark);
                if !keep_going? {
                    break;
                }
            }
            skip_test = false;
            self.checkpoint()?;
            match self.execute_block(body)? {
                Flow::Normal | Flow::ContinueWhile => {}
                Flow::ExitWhile => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_try(&mut self, try_block: &Block, binding: &Identifier, catch_block: &Block) -> InterpResult<Flow> {
        match self.execute_block(try_block) {
            Err(Signal::Error(err)) => {
                log::debug!("caught runtime error {}: {}", err.errno(), err.message);
                let error_aa = self.error_object(&err);
                self.env
                    .define(Scope::Function, &binding.text, Value::Object(error_aa), Some(&binding.loc))?;
                self.execute_block(catch_block)
            }
            other => other,
        }
    }

    /// `{ backtrace, message, number }` for a caught error
    fn error_object(&self, err: &RuntimeError) -> ObjRef {
        let heap = &self.context.heap;
        let frames = if err.backtrace.is_empty() {
            &self.stack
        } else {
            &err.backtrace
        };
        let mut line_loc = err.location.clone().unwrap_or_else(|| self.current_loc.clone());
        let mut entries = Vec::with_capacity(frames.len());
        for frame in frames.iter().rev() {
            let entry = RoAssociativeArray::create(
                heap,
                vec![
                    ("filename".to_string(), Value::string(&*line_loc.file)),
                    ("function".to_string(), Value::string(&frame.signature)),
                    ("line_number".to_string(), Value::Int32(line_loc.start.line as i32)),
                ],
            );
            entries.push(Value::Object(entry));
            line_loc = frame.call_loc.clone();
        }
        let backtrace = RoArray::create(heap, entries);
        RoAssociativeArray::create(
            heap,
            vec![
                ("backtrace".to_string(), Value::Object(backtrace)),
                ("message".to_string(), Value::string(&err.message)),
                ("number".to_string(), Value::Int32(err.errno())),
            ],
        )
    }

    fn print(&mut self, items: &[PrintItem]) -> InterpResult<()> {
        let mut out = String::new();
        for item in items {
            match item {
                PrintItem::Comma => {
                    let pad = PRINT_ZONE - self.print_column % PRINT_ZONE;
                    out.push_str(&" ".repeat(pad));
                    self.print_column += pad;
                }
                PrintItem::Semicolon => {}
                PrintItem::Expr(expr) => {
                    let value = self.evaluate(expr)?;
                    let text = match value.as_f64() {
                        Some(n) if n >= 0.0 => format!(" {}", value.to_print_string()),
                        _ => value.to_print_string(),
                    };
                    self.advance_column(&text);
                    out.push_str(&text);
                }
            }
        }
        if !matches!(items.last(), Some(PrintItem::Semicolon)) {
            out.push('\n');
            self.print_column = 0;
        }
        self.context.post(HostMessage::Print(out));
        Ok(())
    }

    fn advance_column(&mut self, text: &str) {
        match text.rfind('\n') {
            Some(pos) => self.print_column = text[pos + 1..].chars().count(),
            None => self.print_column += text.chars().count(),
        }
    }

    // ============================================
    // Expressions
    // ============================================

    pub fn evaluate(&mut self, expr: &Expression) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.evaluate_inner(expr).map_err(|signal| signal.at(&expr.loc))
        })
    }

    fn evaluate_inner(&mut self, expr: &Expression) -> InterpResult<Value> {
        match &expr.node {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Variable(name) => Ok(self.env.get(&name.text).unwrap_or(Value::Uninitialized)),
            Expr::Binary { left, op, right } => {
                let left = self.evaluate(left)?;
                match (op, &left) {
                    (BinaryOp::And, Value::Boolean(false)) => return Ok(Value::Boolean(false)),
                    (BinaryOp::Or, Value::Boolean(true)) => return Ok(Value::Boolean(true)),
                    _ => {}
                }
                let right = self.evaluate(right)?;
                Ok(operators::binary(*op, &left, &right)?)
            }
            Expr::Unary { op, right } => {
                let value = self.evaluate(right)?;
                Ok(operators::unary(*op, &value)?)
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Call {
                callee,
                args,
                optional,
            } => self.evaluate_call(callee, args, *optional, &expr.loc),
            Expr::DottedGet {
                obj,
                name,
                optional,
            } => self.dotted_get(obj, name, *optional),
            Expr::IndexedGet {
                obj,
                index,
                optional,
            } => {
                let source = self.evaluate(obj)?;
                if *optional && matches!(source, Value::Invalid | Value::Uninitialized) {
                    return Ok(Value::Invalid);
                }
                let index = self.evaluate(index)?;
                match source.as_object() {
                    Some(target) => Ok(target.get_element(&index)?),
                    None => Err(RuntimeError::type_mismatch(&format!(
                        "Attempting to index into non-indexable value of type {}.",
                        source.kind()
                    ))
                    .into()),
                }
            }
            Expr::Function(func) => Ok(Value::Callable(Rc::new(Callable::user(None, Arc::clone(func))))),
            Expr::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                let array = Value::Object(RoArray::create(&self.context.heap, values));
                self.track(&array);
                Ok(array)
            }
            Expr::AALiteral(members) => {
                let mut pairs = Vec::with_capacity(members.len());
                for member in members {
                    pairs.push((member.name.clone(), self.evaluate(&member.value)?));
                }
                let aa = Value::Object(RoAssociativeArray::create(&self.context.heap, pairs));
                self.track(&aa);
                Ok(aa)
            }
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
        optional: bool,
        loc: &Location,
    ) -> InterpResult<Value> {
        let (target, receiver) = match &callee.node {
            Expr::DottedGet {
                obj,
                name,
                optional: optional_get,
            } => {
                let source = self.evaluate(obj)?;
                if (*optional_get || optional) && matches!(source, Value::Invalid | Value::Uninitialized) {
                    return Ok(Value::Invalid);
                }
                let method = resolve_method(&source, name).map_err(|e| e.at(&name.loc))?;
                (method, source.as_object().cloned())
            }
            _ => (self.evaluate(callee)?, None),
        };
        let callable = match target {
            Value::Callable(callable) => callable,
            Value::Invalid | Value::Uninitialized if optional => return Ok(Value::Invalid),
            _ => {
                return Err(RuntimeError::not_a_function(&callee_name(callee))
                    .at(loc)
                    .into());
            }
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?);
        }
        let result = self.call_callable(&callable, values, loc, receiver)?;
        self.track(&result);
        Ok(result)
    }

    fn dotted_get(&mut self, obj: &Expression, name: &Identifier, optional: bool) -> InterpResult<Value> {
        let source = self.evaluate(obj)?;
        if optional && matches!(source, Value::Invalid | Value::Uninitialized) {
            return Ok(Value::Invalid);
        }
        let target = match &source {
            Value::Object(target) => {
                if let Some(iface) = target.interface(&name.text) {
                    return Ok(Value::Interface(Rc::clone(target), iface));
                }
                target
            }
            Value::Interface(target, iface) => {
                return Ok(match target.get_method(&name.text, Some(iface.name)) {
                    Some(spec) => Value::Callable(bind_method(target, spec)),
                    None => Value::Invalid,
                });
            }
            _ => return Err(RuntimeError::dot_on_non_object().at(&name.loc).into()),
        };
        let property = target.get_property(&name.text);
        if let Some(value) = &property {
            if !matches!(value, Value::Invalid) {
                return Ok(value.clone());
            }
        }
        if let Some(spec) = target.get_method(&name.text, None) {
            return Ok(Value::Callable(bind_method(target, spec)));
        }
        Ok(property.unwrap_or(Value::Invalid))
    }

    // ============================================
    // Calls
    // ============================================

    /// Invoke `callable` with `args`; `receiver` becomes `m` for user functions
    pub fn call_callable(
        &mut self,
        callable: &Rc<Callable>,
        args: Vec<Value>,
        call_loc: &Location,
        receiver: Option<ObjRef>,
    ) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.call_inner(callable, args, call_loc, receiver)
        })
    }

    fn call_inner(
        &mut self,
        callable: &Rc<Callable>,
        args: Vec<Value>,
        call_loc: &Location,
        receiver: Option<ObjRef>,
    ) -> InterpResult<Value> {
        let Some(satisfied) = callable.get_first_satisfied_signature(&args) else {
            return Err(callable.mismatch_error(&args).at(call_loc).into());
        };
        match satisfied.implementation {
            Implementation::Native(func) => {
                let func = Rc::clone(func);
                let mut args = satisfied.args;
                for declared in satisfied.signature.args.iter().skip(args.len()) {
                    match &declared.default {
                        Some(_) => args.push(self.default_argument(declared)?),
                        None => break,
                    }
                }
                func(self, &args).map_err(|signal| signal.at(call_loc))
            }
            Implementation::User(func) => self.call_user(
                callable,
                satisfied.signature,
                func,
                satisfied.args,
                call_loc,
                receiver,
            ),
        }
    }

    fn call_user(
        &mut self,
        callable: &Callable,
        signature: &Signature,
        func: &FunctionExpr,
        args: Vec<Value>,
        call_loc: &Location,
        receiver: Option<ObjRef>,
    ) -> InterpResult<Value> {
        if self.stack.len() >= self.context.options.max_call_depth {
            return Err(RuntimeError::stack_overflow().at(call_loc).into());
        }
        let mut sub_env = self.env.create_sub_environment();
        let m = receiver.unwrap_or_else(|| Rc::clone(self.env.root_m()));
        sub_env.set_m_pointer(m);
        self.stack.push(TracePoint {
            function_name: callable.name().to_string(),
            function_loc: func.loc.clone(),
            call_loc: call_loc.clone(),
            signature: signature.describe(callable.name()),
        });
        let caller_env = std::mem::replace(&mut self.env, sub_env);
        let pending_goto = self.goto_target.take();

        let result = self.run_function(signature, func, args);

        let returned = result.as_ref().ok().and_then(Value::as_object).cloned();
        if let Some(obj) = &returned {
            obj.set_return(true);
        }
        self.env.remove_references();
        if let Some(obj) = &returned {
            obj.set_return(false);
        }
        self.env = caller_env;
        self.goto_target = pending_goto;

        let result = result.map_err(|signal| match signal {
            Signal::Error(mut err) => {
                if err.backtrace.is_empty() {
                    err.backtrace = self.stack.clone();
                }
                Signal::Error(err.at(&func.loc))
            }
            end => end,
        });
        self.stack.pop();
        result
    }

    fn run_function(&mut self, signature: &Signature, func: &FunctionExpr, args: Vec<Value>) -> InterpResult<Value> {
        let mut provided = args.into_iter();
        for declared in &signature.args {
            let value = match provided.next() {
                Some(value) => value,
                None => self.default_argument(declared)?,
            };
            self.env
                .define(Scope::Function, &declared.name, value, Some(&func.loc))?;
        }

        let returned = match self.run_body(&func.body)? {
            Flow::Normal => return implicit_return(func.return_kind),
            Flow::Return(value) => value,
            flow => {
                stray_flow_error(&flow)?;
                None
            }
        };
        match (returned, func.return_kind) {
            (Some(_), ValueKind::Void) => Err(RuntimeError::from_kind(ErrorKind::ReturnWithValue).into()),
            (Some(value), kind) => try_coerce(&value, kind)
                .ok_or_else(|| RuntimeError::cast(value.kind().name(), kind.name()).into()),
            (None, ValueKind::Void | ValueKind::Dynamic) => Ok(Value::Invalid),
            (None, _) => Err(RuntimeError::from_kind(ErrorKind::ReturnWithoutValue).into()),
        }
    }

    /// Default for an omitted argument, evaluated in the current environment
    fn default_argument(&mut self, declared: &Argument) -> InterpResult<Value> {
        let Some(expr) = &declared.default else {
            return Ok(Value::Invalid);
        };
        let value = self.evaluate(expr)?;
        try_coerce(&value, declared.kind).ok_or_else(|| {
            RuntimeError::cast(value.kind().name(), declared.kind.name())
                .at(&expr.loc)
                .into()
        })
    }

    // ============================================
    // Backtraces
    // ============================================

    /// Render the call stack innermost first, ending at `location`
    pub fn format_backtrace(frames: &[TracePoint], location: &Location) -> String {
        let mut out = String::new();
        let mut line_loc = location.clone();
        for (index, frame) in frames.iter().enumerate().rev() {
            out.push_str(&format!(
                "#{index}  Function {}\n   file/line: {}({})\n",
                frame.signature, line_loc.file, line_loc.start.line
            ));
            line_loc = frame.call_loc.clone();
        }
        out
    }

    /// Backtrace of the current call stack
    pub fn backtrace(&self) -> String {
        Self::format_backtrace(&self.stack, &self.current_loc)
    }
}

/// Loop signals that reached a function boundary
fn stray_flow_error(flow: &Flow) -> Result<(), RuntimeError> {
    let kind = match flow {
        Flow::Normal | Flow::Return(_) => return Ok(()),
        Flow::Goto(label) => return Err(RuntimeError::missing_label(label)),
        Flow::ExitFor => ErrorKind::ExitForWithoutFor,
        Flow::ExitWhile => ErrorKind::ExitWhileWithoutWhile,
        Flow::ContinueFor => ErrorKind::ContinueForWithoutFor,
        Flow::ContinueWhile => ErrorKind::ContinueWhileWithoutWhile,
    };
    Err(RuntimeError::from_kind(kind))
}

/// Result of a function that ran off its end
fn implicit_return(kind: ValueKind) -> InterpResult<Value> {
    match kind {
        ValueKind::Void | ValueKind::Dynamic => Ok(Value::Invalid),
        kind => try_coerce(&Value::Int32(0), kind)
            .ok_or_else(|| RuntimeError::cast(ValueKind::Int32.name(), kind.name()).into()),
    }
}

fn callee_name(callee: &Expression) -> String {
    match &callee.node {
        Expr::Variable(name) => name.text.clone(),
        Expr::DottedGet { name, .. } => name.text.clone(),
        _ => "[anonymous function]".to_string(),
    }
}

/// Callable a method call on `source` resolves to
fn resolve_method(source: &Value, name: &Identifier) -> Result<Value, RuntimeError> {
    let (target, filter) = match source {
        Value::Object(target) => (target, None),
        Value::Interface(target, iface) => (target, Some(iface.name)),
        _ => return Err(RuntimeError::dot_on_non_object()),
    };
    if filter.is_none() {
        if let Some(Value::Callable(callable)) = target.get_property(&name.text) {
            return Ok(Value::Callable(callable));
        }
    }
    target
        .get_method(&name.text, filter)
        .map(|spec| Value::Callable(bind_method(target, spec)))
        .ok_or_else(|| RuntimeError::member_not_found(&name.text))
}

/// A component method as a callable bound to its receiver
fn bind_method(target: &ObjRef, spec: &'static MethodSpec) -> Rc<Callable> {
    let args = spec
        .args
        .iter()
        .map(|(name, kind)| Argument::new(*name, *kind))
        .collect();
    let receiver = Rc::clone(target);
    let func = spec.func;
    Rc::new(Callable::native(
        spec.name,
        Signature::new(args, spec.returns),
        move |interp, args| func(interp, &receiver, args),
    ))
}

fn set_dotted(target: &Value, name: &Identifier, value: Value) -> Result<(), RuntimeError> {
    match target.as_object() {
        Some(obj) => obj.set_property(&name.text, value).map_err(|e| e.at(&name.loc)),
        None => Err(RuntimeError::dot_on_non_object().at(&name.loc)),
    }
}

fn set_indexed(target: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match target.as_object() {
        Some(obj) => obj.set_element(index, value),
        None => Err(RuntimeError::from_kind(ErrorKind::BadLHS)),
    }
}

fn build_dimensions(heap: &Rc<HeapStats>, sizes: &[usize]) -> ObjRef {
    match sizes {
        [] | [_] => RoArray::create(heap, Vec::new()),
        [size, rest @ ..] => {
            let children = (0..*size)
                .map(|_| Value::Object(build_dimensions(heap, rest)))
                .collect();
            RoArray::create(heap, children)
        }
    }
}

/// Error raised by `throw value`
fn thrown_error(value: &Value) -> RuntimeError {
    if let Value::String(text) = value {
        return RuntimeError::new(ErrorKind::UserDefined, text.to_string());
    }
    let Some(aa) = value
        .as_object()
        .and_then(|obj| obj.as_any().downcast_ref::<RoAssociativeArray>())
    else {
        return RuntimeError::from_kind(ErrorKind::MalformedThrow);
    };
    let mut kind = ErrorKind::UserDefined;
    let mut message = None;
    match aa.lookup("number") {
        Some(Value::Int32(errno)) => kind = ErrorKind::from_errno(errno),
        None | Some(Value::Invalid) => {}
        Some(_) => {
            return RuntimeError::new(ErrorKind::MalformedThrow, "Thrown \"number\" is not an integer.");
        }
    }
    match aa.lookup("message") {
        Some(Value::String(text)) => message = (!text.is_empty()).then(|| text.to_string()),
        None | Some(Value::Invalid) => {}
        Some(_) => {
            return RuntimeError::new(ErrorKind::MalformedThrow, "Thrown \"message\" is not a string.");
        }
    }
    let message = message.unwrap_or_else(|| kind.default_message().to_string());
    RuntimeError::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use crate::parser::parse;
    use crate::runtime::config::ExecutionOptions;
    use crate::task::message::{MessageReceiver, channel};

    fn program(source: &str) -> Vec<Statement> {
        let scanned = scan(source, "test.brs");
        assert!(scanned.errors.is_empty(), "lex errors: {:?}", scanned.errors);
        let parsed = parse(&scanned.tokens);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        parsed.statements
    }

    fn interpreter() -> (Interpreter, MessageReceiver) {
        let (tx, rx) = channel();
        (Interpreter::new(RuntimeContext::new(tx)), rx)
    }

    /// Run `source`, returning the result and everything printed
    fn run(source: &str) -> (InterpResult<Value>, String) {
        let statements = program(source);
        let (mut interp, mut rx) = interpreter();
        let result = interp.exec(&statements, None);
        interp.release_all();
        let printed = rx
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                HostMessage::Print(text) => Some(text),
                _ => None,
            })
            .collect();
        (result, printed)
    }

    fn output(source: &str) -> String {
        let (result, printed) = run(source);
        assert!(result.is_ok(), "execution failed: {result:?}");
        printed
    }

    fn error(source: &str) -> RuntimeError {
        match run(source).0 {
            Err(Signal::Error(err)) => err,
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    // ============================================
    // Entry points and top level
    // ============================================

    #[test]
    fn test_main_is_called() {
        assert_eq!(output("sub main()\n print \"hi\"\nend sub\n"), "hi\n");
    }

    #[test]
    fn test_run_user_interface_preferred() {
        let src = "sub main()\n print \"main\"\nend sub\nsub RunUserInterface()\n print \"rui\"\nend sub\n";
        assert_eq!(output(src), "rui\n");
    }

    #[test]
    fn test_top_level_assignment_defines_function_scope() {
        let statements = program("a = 1 + 2\n");
        let (mut interp, _rx) = interpreter();
        interp.exec(&statements, None).unwrap();
        assert_eq!(interp.environment().get("a"), Ok(Value::Int32(3)));
        assert!(interp.environment().has("a", Some(&[Scope::Function])));
    }

    #[test]
    fn test_missing_entry_point_warns() {
        let statements = program("function helper()\nend function\n");
        let (mut interp, mut rx) = interpreter();
        interp.exec(&statements, None).unwrap();
        assert!(
            rx.drain()
                .contains(&HostMessage::Warning(NO_ENTRY_POINT_WARNING.to_string()))
        );
    }

    #[test]
    fn test_input_params_passed_when_declared() {
        let statements = program("sub main(args)\n print args.source\nend sub\n");
        let (mut interp, mut rx) = interpreter();
        let params = RoAssociativeArray::create(
            interp.heap(),
            vec![("source".to_string(), Value::string("auto-run-dev"))],
        );
        interp.exec(&statements, Some(Value::Object(params))).unwrap();
        assert_eq!(rx.try_recv(), Some(HostMessage::Start("main".into())));
        assert_eq!(rx.try_recv(), Some(HostMessage::Print("auto-run-dev\n".into())));
    }

    // ============================================
    // Print
    // ============================================

    #[test]
    fn test_print_separators() {
        assert_eq!(output("print 1; 2\n"), " 1 2\n");
        assert_eq!(output("print \"a\", \"b\"\n"), "a               b\n");
        assert_eq!(output("print -3\n"), "-3\n");
        assert_eq!(output("print \"no newline\";\n"), "no newline");
    }

    #[test]
    fn test_print_floats() {
        assert_eq!(output("print 1 / 3\n"), " 0.333333\n");
        assert_eq!(output("print 7 / 2\n"), " 3.5\n");
    }

    // ============================================
    // Functions
    // ============================================

    #[test]
    fn test_typed_function_without_return_yields_zero() {
        let src = "function f() as Integer\nend function\nsub main()\n print f()\nend sub\n";
        assert_eq!(output(src), " 0\n");
    }

    #[test]
    fn test_argument_coercion() {
        let src = "sub show(x as Integer)\n print x\nend sub\nsub main()\n show(2.0)\nend sub\n";
        assert_eq!(output(src), " 2\n");
        let src = "sub show(x as Integer)\n print x\nend sub\nsub main()\n show(\"2\")\nend sub\n";
        let err = error(src);
        assert_eq!(err.errno(), 24);
        assert!(err.message.contains("'x'"), "{}", err.message);
    }

    #[test]
    fn test_default_arguments_see_earlier_parameters() {
        let src = "function add(a, b = a + 1)\n return a + b\nend function\nsub main()\n print add(2)\nend sub\n";
        assert_eq!(output(src), " 5\n");
    }

    #[test]
    fn test_return_with_value_from_sub() {
        let err = error("sub f()\n return 1\nend sub\nsub main()\n f()\nend sub\n");
        assert_eq!(err.errno(), 170);
    }

    #[test]
    fn test_bare_return_in_typed_function() {
        let err = error("function f() as String\n return\nend function\nsub main()\n f()\nend sub\n");
        assert_eq!(err.errno(), 169);
    }

    #[test]
    fn test_return_value_cast_failure() {
        let err = error("function f() as Integer\n return \"x\"\nend function\nsub main()\n f()\nend sub\n");
        assert_eq!(err.errno(), 24);
        assert!(err.message.contains("Unable to cast"));
    }

    #[test]
    fn test_recursion_and_stack_overflow() {
        let src = "function fact(n)\n if n <= 1 then return 1\n return n * fact(n - 1)\nend function\nsub main()\n print fact(10)\nend sub\n";
        assert_eq!(output(src), " 3628800\n");

        let statements = program("sub down(n)\n down(n + 1)\nend sub\nsub main()\n down(0)\nend sub\n");
        let (tx, _rx) = channel();
        let ctx = RuntimeContext::new(tx).with_options(ExecutionOptions::default().max_call_depth(50));
        let mut interp = Interpreter::new(ctx);
        match interp.exec(&statements, None) {
            Err(Signal::Error(err)) => {
                assert_eq!(err.errno(), 223);
                assert_eq!(err.backtrace.len(), 50);
            }
            other => panic!("expected stack overflow, got {other:?}"),
        }
    }

    #[test]
    fn test_calling_non_function() {
        let err = error("sub main()\n x = 3\n x()\nend sub\n");
        assert_eq!(err.errno(), 224);
        let err = error("sub main()\n undefinedThing()\nend sub\n");
        assert_eq!(err.errno(), 224);
    }

    #[test]
    fn test_local_shadowing_declared_function() {
        let err = error("function helper()\nend function\nsub main()\n helper = 1\nend sub\n");
        assert_eq!(err.errno(), 160);
    }

    #[test]
    fn test_anonymous_function_and_m() {
        let src = "sub main()\n obj = { value: 5, get: function()\n return m.value\n end function }\n print obj.get()\nend sub\n";
        assert_eq!(output(src), " 5\n");
    }

    // ============================================
    // Control flow
    // ============================================

    #[test]
    fn test_for_loop_with_step() {
        assert_eq!(output("for i = 10 to 1 step -4\n print i;\nend for\n"), " 10 6 2");
        assert_eq!(output("for i = 1 to 0\n print i\nend for\n"), "");
    }

    #[test]
    fn test_fractional_step_truncated() {
        let src = "n = 0\nfor i = 0 to 1 step 0.5\n n = n + 1\nend for\nprint n\n";
        assert_eq!(output(src), " 0\n");
        assert_eq!(output("for i = 1 to 4 step 1.9\n print i;\nend for\n"), " 1 2 3 4");
        assert_eq!(output("for i = 3 to 1 step -1.5#\n print i;\nend for\n"), " 3 2 1");
    }

    #[test]
    fn test_exit_and_continue() {
        let src = "for i = 1 to 5\n if i = 2 then continue for\n if i = 4 then exit for\n print i;\nend for\n";
        assert_eq!(output(src), " 1 3");
        let src = "i = 0\nwhile true\n i = i + 1\n if i > 3 then exit while\nend while\nprint i\n";
        assert_eq!(output(src), " 4\n");
    }

    #[test]
    fn test_for_each_over_array_and_aa() {
        assert_eq!(output("for each x in [1, 2, 3]\n print x;\nend for\n"), " 1 2 3");
        assert_eq!(output("for each k in { b: 1, a: 2 }\n print k;\nend for\n"), "ab");
    }

    #[test]
    fn test_stray_exit_for_at_function_boundary() {
        let err = error("sub main()\n exit for\nend sub\n");
        assert_eq!(err.errno(), 165);
        let err = error("sub main()\n continue while\nend sub\n");
        assert_eq!(err.errno(), 142);
    }

    #[test]
    fn test_goto_forward_and_into_blocks() {
        let src = "sub main()\n goto skip\n print \"not printed\"\nskip:\n print \"after\"\nend sub\n";
        assert_eq!(output(src), "after\n");
        let src = "sub main()\n goto inner\n if false then\ninner:\n print \"inside\"\n end if\nend sub\n";
        assert_eq!(output(src), "inside\n");
    }

    #[test]
    fn test_goto_backwards_loops() {
        let src = "sub main()\n n = 0\nagain:\n n = n + 1\n if n < 3 then goto again\n print n\nend sub\n";
        assert_eq!(output(src), " 3\n");
    }

    #[test]
    fn test_goto_missing_label() {
        let err = error("sub main()\n goto nowhere\nend sub\n");
        assert_eq!(err.errno(), 14);
    }

    #[test]
    fn test_end_statement_terminates() {
        let (result, printed) = run("sub main()\n print \"a\"\n end\n print \"b\"\nend sub\n");
        assert_eq!(result, Err(Signal::End(EndReason::EndStatement)));
        assert_eq!(printed, "a\n");
    }

    #[test]
    fn test_stop_without_debugger() {
        let (result, _) = run("sub main()\n stop\nend sub\n");
        assert_eq!(result, Err(Signal::End(EndReason::Stop)));
    }

    // ============================================
    // Try / catch / throw
    // ============================================

    #[test]
    fn test_catch_runtime_error() {
        let src = "sub main()\n try\n  x = 1 / 0\n catch e\n  print e.number; \" \"; e.message\n end try\nend sub\n";
        assert_eq!(output(src), " 20 Divide by Zero.\n");
    }

    #[test]
    fn test_throw_string_and_aa() {
        let src = "sub main()\n try\n  throw \"boom\"\n catch e\n  print e.number; e.message\n end try\nend sub\n";
        assert_eq!(output(src), " 40boom\n");
        let src = "sub main()\n try\n  throw { number: 500, message: \"custom\" }\n catch e\n  print e.number; e.message\n end try\nend sub\n";
        assert_eq!(output(src), " 500custom\n");
    }

    #[test]
    fn test_malformed_throw() {
        let err = error("sub main()\n throw 3\nend sub\n");
        assert_eq!(err.errno(), 38);
        assert_eq!(err.message, "Thrown value neither string nor roAssociativeArray.");
    }

    #[test]
    fn test_catch_backtrace_has_frames() {
        let src = "sub fail()\n throw \"x\"\nend sub\nsub main()\n try\n  fail()\n catch e\n  print e.backtrace.count()\n  print e.backtrace[0].function\n end try\nend sub\n";
        assert_eq!(output(src), " 2\nfail() As Void\n");
    }

    #[test]
    fn test_end_passes_through_try() {
        let (result, _) = run("sub main()\n try\n  end\n catch e\n  print \"caught\"\n end try\nend sub\n");
        assert!(matches!(result, Err(Signal::End(_))));
    }

    // ============================================
    // Objects and lifetime
    // ============================================

    #[test]
    fn test_array_methods_and_indexing() {
        let src = "sub main()\n a = [1, 2]\n a.push(3)\n a[5] = 9\n print a.count(); a[1]; a[4]\nend sub\n";
        assert_eq!(output(src), " 6 2invalid\n");
    }

    #[test]
    fn test_interface_qualified_call() {
        let src = "sub main()\n a = []\n a.ifArray.push(7)\n print a.ifArrayGet.getEntry(0)\n print type(a.ifArray)\nend sub\n";
        assert_eq!(output(src), " 7\nifArray\n");
    }

    #[test]
    fn test_member_not_found() {
        let err = error("sub main()\n a = []\n a.nothing()\nend sub\n");
        assert_eq!(err.errno(), 244);
    }

    #[test]
    fn test_dot_on_non_object() {
        let err = error("sub main()\n x = invalid\n print x.foo\nend sub\n");
        assert_eq!(err.errno(), 236);
        assert_eq!(output("sub main()\n x = invalid\n print x?.foo\nend sub\n"), "invalid\n");
    }

    #[test]
    fn test_dim_creates_nested_arrays() {
        let src = "sub main()\n dim grid[2, 3]\n print grid.count()\n grid[1][2] = \"x\"\n print grid[1][2]\nend sub\n";
        assert_eq!(output(src), " 3\nx\n");
    }

    #[test]
    fn test_dim_beyond_array_limit() {
        let err = error("sub main()\n dim a[9223372036854775807&]\nend sub\n");
        assert_eq!(err.errno(), 16);
        let err = error("sub main()\n dim cube[3000, 3000, 3000]\nend sub\n");
        assert_eq!(err.errno(), 16);
        assert_eq!(output("sub main()\n dim none[-1]\n print none.count()\nend sub\n"), " 0\n");
    }

    #[test]
    fn test_index_beyond_array_limit() {
        let err = error("sub main()\n a = []\n a[2000000000] = 1\nend sub\n");
        assert_eq!(err.errno(), 16);
    }

    #[test]
    fn test_designator_coercion() {
        assert_eq!(output("n% = 3.7\nprint n%\n"), " 3\n");
        let err = error("s$ = 1\n");
        assert_eq!(err.errno(), 24);
    }

    #[test]
    fn test_increment() {
        assert_eq!(output("sub main()\n i = 1\n i++\n a = [5]\n a[0]--\n print i; a[0]\nend sub\n"), " 2 4\n");
    }

    #[test]
    fn test_all_components_disposed() {
        let src = "function make()\n return { list: [1, [2, 3]] }\nend function\nsub main()\n x = make()\n y = x.list\n make()\n z = CreateObject(\"roArray\")\nend sub\n";
        let statements = program(src);
        let (mut interp, _rx) = interpreter();
        interp.exec(&statements, None).unwrap();
        interp.release_all();
        let heap = interp.heap();
        assert!(heap.created() > 2);
        assert_eq!(heap.created(), heap.disposed(), "{}", heap.summary());
    }

    #[test]
    fn test_returned_object_survives_callee_cleanup() {
        let src = "function make()\n local = [1, 2]\n return local\nend function\nsub main()\n v = make()\n print v.count()\nend sub\n";
        assert_eq!(output(src), " 2\n");
    }
}
