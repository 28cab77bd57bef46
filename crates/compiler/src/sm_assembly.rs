//! State machine assembly.
//!
//! Turns a state machine parse plus a state vector into a runnable
//! [`StateMachine`]. Phases, in order:
//!
//! 1. Bind `[STATE_VECTOR]` entries against the provided vector and
//!    record aliases and read-only flags.
//! 2. Require the reserved `G` (global time, U64) and `S` (state, U32)
//!    elements, by name or alias; both become read-only.
//! 3. Build the local state vector: reserved `T` (state time, U64,
//!    read-only) first, then the `[LOCAL]` elements; evaluate their
//!    initializers in declaration order against the local scope only.
//! 4. Number states 1.. in textual order.
//! 5. Compile every guard and assignment expression against the union
//!    scope (state vector elements, aliases, locals, `T`).
//! 6. Compile actions, rejecting writes to read-only elements and
//!    transitions inside exit labels.
//! 7. Register every rolling-stats instance for per-step update.
//! 8. Seed the state element with the first state's id when it still
//!    holds `NO_STATE`, then hand the config to `StateMachine::create`.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use surefire_core::{
    Action, Block, ElementType, Error, NO_STATE, State, StateMachine, StateVector, StatsRef,
    state_machine,
};

use crate::diag::ConfigError;
use crate::expr_assembly::{self, SymbolTable};
use crate::sm_parse::{self, ActionParse, BlockParse, StateMachineParse};
use crate::sv_assembly;
use crate::token;

const ERR_CATEGORY: &str = "state machine config error";

const GLOBAL_TIME_NAME: &str = "G";
const STATE_NAME: &str = "S";
const STATE_TIME_NAME: &str = "T";

/// A compiled state machine together with its local state vector. The
/// local vector stays accessible so integrators and tests can observe
/// machine-private elements.
#[derive(Debug)]
pub struct StateMachineAssembly {
    pub machine: StateMachine,
    pub local: StateVector,
}

/// Compile a state machine config from source text against a state
/// vector.
pub fn compile_str(source: &str, sv: &StateVector) -> Result<StateMachineAssembly, ConfigError> {
    let compile = || {
        let toks = token::tokenize(source)?;
        let parse = sm_parse::parse(&toks)?;
        compile_parse(&parse, sv)
    };
    compile().map_err(|e| e.with_source(source))
}

/// Compile a state machine config file against a state vector.
pub fn compile_file(path: &Path, sv: &StateVector) -> Result<StateMachineAssembly, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::global(
            Error::File,
            ERR_CATEGORY,
            format!("failed to open file `{}`: {}", path.display(), e),
        )
    })?;
    compile_str(&source, sv).map_err(|e| e.with_file(path))
}

struct Workspace {
    /// Union scope for expression compilation: state vector elements,
    /// aliases, locals, and `T`.
    symbols: SymbolTable,
    /// Names that assignments may not target, including the reserved
    /// `G`, `S`, and `T`.
    read_only: HashSet<String>,
    /// State vector element names and aliases, for the local-scope
    /// checks.
    sv_names: HashSet<String>,
    /// State name to id, in textual order.
    state_ids: Vec<(String, u32)>,
    /// Every rolling-stats instance compiled into runtime expressions.
    stats: Vec<StatsRef>,
}

/// Compile a parsed state machine config against a state vector.
pub fn compile_parse(
    parse: &StateMachineParse,
    sv: &StateVector,
) -> Result<StateMachineAssembly, ConfigError> {
    let mut ws = Workspace {
        symbols: SymbolTable::new(),
        read_only: HashSet::new(),
        sv_names: HashSet::new(),
        state_ids: Vec::new(),
        stats: Vec::new(),
    };

    check_state_vector(parse, sv, &mut ws)?;
    let (local_sv, local_symbols) = build_local_state_vector(parse, &mut ws)?;
    init_local_values(parse, &local_sv, &local_symbols, &ws)?;

    if parse.states.is_empty() {
        return Err(ConfigError::global(
            Error::SmcNoStates,
            ERR_CATEGORY,
            "no states",
        ));
    }
    for (idx, state) in parse.states.iter().enumerate() {
        if ws.state_ids.iter().any(|(n, _)| *n == state.name.text) {
            return Err(ConfigError::at(
                Error::SmcStateDupe,
                ERR_CATEGORY,
                format!("reuse of state name `{}`", state.name.text),
                &state.name,
            ));
        }
        ws.state_ids.push((state.name.text.clone(), (idx + 1) as u32));
    }

    let mut states = Vec::new();
    for (idx, state) in parse.states.iter().enumerate() {
        states.push(State {
            id: (idx + 1) as u32,
            entry: compile_label(&state.entry, &mut ws, false)?,
            step: compile_label(&state.step, &mut ws, false)?,
            exit: compile_label(&state.exit, &mut ws, true)?,
        });
    }

    let lookup_unreachable =
        || ConfigError::global(Error::Unreachable, ERR_CATEGORY, "reserved element lookup");
    let state_elem = ws
        .symbols
        .get(STATE_NAME)
        .ok_or_else(lookup_unreachable)?
        .typed::<u32>()
        .map_err(|e| ConfigError::global(e, ERR_CATEGORY, "state element type"))?;
    let global_time_elem = ws
        .symbols
        .get(GLOBAL_TIME_NAME)
        .ok_or_else(lookup_unreachable)?
        .typed::<u64>()
        .map_err(|e| ConfigError::global(e, ERR_CATEGORY, "global time element type"))?;
    let state_time_elem = local_sv
        .get_element::<u64>(STATE_TIME_NAME)
        .map_err(|e| ConfigError::global(e, ERR_CATEGORY, "state time element"))?;

    // A fresh state vector starts the machine in the first state; a
    // pre-seeded state element picks the initial state explicitly.
    if state_elem.read() == NO_STATE {
        state_elem.write(1);
    }

    debug!(
        states = states.len(),
        locals = parse.local_elems.len(),
        stats = ws.stats.len(),
        "state machine compiled"
    );

    let machine = StateMachine::create(state_machine::Config {
        state_elem,
        state_time_elem,
        global_time_elem,
        states,
        stats: ws.stats,
    })
    .map_err(|e| ConfigError::global(e, ERR_CATEGORY, e.to_string()))?;

    Ok(StateMachineAssembly {
        machine,
        local: local_sv,
    })
}

/// Phase 1 and 2: bind `[STATE_VECTOR]` entries and require `G`/`S`.
fn check_state_vector(
    parse: &StateMachineParse,
    sv: &StateVector,
    ws: &mut Workspace,
) -> Result<(), ConfigError> {
    for elem in &parse.sv_elems {
        let name = &elem.name.text;

        let obj = sv.get_any_element(name).map_err(|_| {
            ConfigError::at(
                Error::SmcSvElem,
                ERR_CATEGORY,
                format!("element `{}` does not exist in state vector", name),
                &elem.name,
            )
        })?;

        let declared = ElementType::from_name(&elem.ty.text).ok_or_else(|| {
            ConfigError::at(
                Error::SmcType,
                ERR_CATEGORY,
                format!("unknown type `{}`", elem.ty.text),
                &elem.ty,
            )
        })?;

        if declared != obj.ty() {
            return Err(ConfigError::at(
                Error::SmcTypeMismatch,
                ERR_CATEGORY,
                format!(
                    "element `{}` is type {} in the state vector but type {} here",
                    name,
                    obj.ty(),
                    declared
                ),
                &elem.ty,
            ));
        }

        if !ws.symbols.insert(name, obj.clone()) {
            return Err(elem_dupe_error(&elem.name));
        }
        ws.sv_names.insert(name.clone());

        let alias = elem.alias.as_ref().map(|t| t.text.as_str());
        let mut read_only = elem.read_only;

        // The reserved global time and state elements have fixed types
        // and are never writable from the machine.
        if name == GLOBAL_TIME_NAME || alias == Some(GLOBAL_TIME_NAME) {
            read_only = true;
            if declared != ElementType::Uint64 {
                return Err(ConfigError::at(
                    Error::SmcGlobalTimeType,
                    ERR_CATEGORY,
                    format!(
                        "`{}` must be type U64 ({} here)",
                        GLOBAL_TIME_NAME, elem.ty.text
                    ),
                    &elem.name,
                ));
            }
        }
        if name == STATE_NAME || alias == Some(STATE_NAME) {
            read_only = true;
            if declared != ElementType::Uint32 {
                return Err(ConfigError::at(
                    Error::SmcStateElemType,
                    ERR_CATEGORY,
                    format!("`{}` must be type U32 ({} here)", STATE_NAME, elem.ty.text),
                    &elem.name,
                ));
            }
        }

        if let Some(alias_tok) = &elem.alias {
            if !ws.symbols.insert(&alias_tok.text, obj.clone()) {
                return Err(elem_dupe_error(alias_tok));
            }
            ws.sv_names.insert(alias_tok.text.clone());
        }

        if read_only {
            ws.read_only.insert(name.clone());
            if let Some(alias_tok) = &elem.alias {
                ws.read_only.insert(alias_tok.text.clone());
            }
        }
    }

    if !ws.symbols.contains(GLOBAL_TIME_NAME) {
        return Err(ConfigError::global(
            Error::SmcNoGlobalTime,
            ERR_CATEGORY,
            format!("no global time element aliased to `{}`", GLOBAL_TIME_NAME),
        ));
    }
    if !ws.symbols.contains(STATE_NAME) {
        return Err(ConfigError::global(
            Error::SmcNoStateElem,
            ERR_CATEGORY,
            format!("no state element aliased to `{}`", STATE_NAME),
        ));
    }

    Ok(())
}

fn elem_dupe_error(tok: &token::Token) -> ConfigError {
    ConfigError::at(
        Error::SmcElemDupe,
        ERR_CATEGORY,
        format!("element `{}` is listed more than once", tok.text),
        tok,
    )
}

/// Phase 3a: build the local state vector (`T` plus `[LOCAL]` elements)
/// and extend the union scope with its elements.
fn build_local_state_vector(
    parse: &StateMachineParse,
    ws: &mut Workspace,
) -> Result<(StateVector, SymbolTable), ConfigError> {
    let mut decls: Vec<(String, ElementType)> =
        vec![(STATE_TIME_NAME.to_string(), ElementType::Uint64)];
    ws.read_only.insert(STATE_TIME_NAME.to_string());

    for elem in &parse.local_elems {
        let name = &elem.name.text;

        if ws.sv_names.contains(name) || decls.iter().any(|(n, _)| n == name) {
            return Err(ConfigError::at(
                Error::SmcElemDupe,
                ERR_CATEGORY,
                format!("reuse of element name `{}`", name),
                &elem.name,
            ));
        }

        let ty = ElementType::from_name(&elem.ty.text).ok_or_else(|| {
            ConfigError::at(
                Error::SmcType,
                ERR_CATEGORY,
                format!("unknown type `{}`", elem.ty.text),
                &elem.ty,
            )
        })?;
        decls.push((name.clone(), ty));

        if elem.read_only {
            ws.read_only.insert(name.clone());
        }
    }

    let local_sv = sv_assembly::build_state_vector("LOCAL", &decls)
        .map_err(|e| ConfigError::global(e, ERR_CATEGORY, e.to_string()))?;

    let local_symbols = SymbolTable::from_state_vector(&local_sv);
    for (name, _) in &decls {
        if let Some(elem) = local_symbols.get(name) {
            ws.symbols.insert(name, elem.clone());
        }
    }

    Ok((local_sv, local_symbols))
}

/// Phase 3b: evaluate local initializers in declaration order. Every
/// identifier must name an already-initialized local element.
fn init_local_values(
    parse: &StateMachineParse,
    local_sv: &StateVector,
    local_symbols: &SymbolTable,
    ws: &Workspace,
) -> Result<(), ConfigError> {
    for (idx, elem) in parse.local_elems.iter().enumerate() {
        let name = &elem.name.text;
        let later: HashSet<&str> = parse.local_elems[idx + 1..]
            .iter()
            .map(|e| e.name.text.as_str())
            .collect();

        let mut ident_err: Option<ConfigError> = None;
        elem.init.visit_idents(&mut |tok| {
            if ident_err.is_some() {
                return;
            }
            if tok.text == *name {
                ident_err = Some(ConfigError::at(
                    Error::SmcSelfRef,
                    ERR_CATEGORY,
                    format!("element `{}` references itself", name),
                    tok,
                ));
            } else if later.contains(tok.text.as_str()) {
                ident_err = Some(ConfigError::at(
                    Error::SmcUseBeforeInit,
                    ERR_CATEGORY,
                    format!("element `{}` is used before it is initialized", tok.text),
                    tok,
                ));
            } else if ws.sv_names.contains(&tok.text) {
                ident_err = Some(ConfigError::at(
                    Error::SmcLocalRefsSv,
                    ERR_CATEGORY,
                    format!(
                        "local element initializer may not reference state vector element `{}`",
                        tok.text
                    ),
                    tok,
                ));
            }
        });
        if let Some(err) = ident_err {
            return Err(err);
        }

        // Stats in an initializer never see a step, so they are
        // compile-time zeros and are not registered.
        let asm = expr_assembly::compile(&elem.init, local_symbols)?;
        let target = local_sv
            .get_any_element(name)
            .map_err(|e| ConfigError::global(e, ERR_CATEGORY, "local element lookup"))?;
        target.write_f64(asm.root.evaluate());
    }

    Ok(())
}

/// Phases 5 and 6 for one label.
fn compile_label(
    parse: &Option<BlockParse>,
    ws: &mut Workspace,
    in_exit: bool,
) -> Result<Option<Block>, ConfigError> {
    match parse {
        Some(block) => Ok(Some(compile_block(block, ws, in_exit)?)),
        None => Ok(None),
    }
}

fn compile_block(
    parse: &BlockParse,
    ws: &mut Workspace,
    in_exit: bool,
) -> Result<Block, ConfigError> {
    let mut block = Block::default();

    if let Some(guard) = &parse.guard {
        let asm = expr_assembly::compile(guard, &ws.symbols)?;
        ws.stats.extend(asm.stats);
        block.guard = Some(asm.root);

        if let Some(if_block) = &parse.if_block {
            block.if_block = Some(Box::new(compile_block(if_block, ws, in_exit)?));
        }
        if let Some(else_block) = &parse.else_block {
            block.else_block = Some(Box::new(compile_block(else_block, ws, in_exit)?));
        }
    }

    if let Some(action) = &parse.action {
        block.action = Some(compile_action(action, ws, in_exit)?);
    }

    if let Some(next) = &parse.next {
        block.next = Some(Box::new(compile_block(next, ws, in_exit)?));
    }

    Ok(block)
}

fn compile_action(
    parse: &ActionParse,
    ws: &mut Workspace,
    in_exit: bool,
) -> Result<Action, ConfigError> {
    match parse {
        ActionParse::Assignment { target, rhs } => {
            let Some(elem) = ws.symbols.get(&target.text) else {
                return Err(ConfigError::at(
                    Error::SmcAssignElem,
                    ERR_CATEGORY,
                    format!("unknown element `{}`", target.text),
                    target,
                ));
            };
            if ws.read_only.contains(&target.text) {
                return Err(ConfigError::at(
                    Error::SmcElemReadOnly,
                    ERR_CATEGORY,
                    format!("element `{}` is read-only", target.text),
                    target,
                ));
            }
            let element = elem.clone();
            let asm = expr_assembly::compile(rhs, &ws.symbols)?;
            ws.stats.extend(asm.stats);
            Ok(Action::Assignment {
                element,
                expr: asm.root,
            })
        }
        ActionParse::Transition { keyword: _, dest } => {
            if in_exit {
                return Err(ConfigError::at(
                    Error::SmcTransExit,
                    ERR_CATEGORY,
                    "illegal transition in exit label",
                    dest,
                ));
            }
            let Some((_, id)) = ws.state_ids.iter().find(|(n, _)| *n == dest.text) else {
                return Err(ConfigError::at(
                    Error::SmcUnknownState,
                    ERR_CATEGORY,
                    format!("unknown state `{}`", dest.text),
                    dest,
                ));
            };
            Ok(Action::Transition(*id))
        }
    }
}
