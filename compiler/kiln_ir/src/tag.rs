//! Instruction tags.
//!
//! Each tag documents the [`InstData`](crate::InstData) variant it uses and,
//! for payload-carrying tags, the extra record it points at.

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum InstTag {
    // === Literals ===
    /// `Int`
    Int,
    /// Integer literal too large for `u64`, stored as decimal digits. `Str`
    IntBig,
    /// `Float`
    Float,
    /// `Str`
    Str,
    /// `.name`. `StrTok`
    EnumLiteral,
    /// `error.Name`. `StrTok`
    ErrorValue,

    // === Arithmetic and bitwise. `PlNode` + `Bin` ===
    Add,
    AddWrap,
    AddSat,
    /// Addition the analyzer may assume does not overflow (loop counters).
    AddUnsafe,
    Sub,
    SubWrap,
    SubSat,
    Mul,
    MulWrap,
    MulSat,
    Div,
    Mod,
    Shl,
    ShlSat,
    Shr,
    BitAnd,
    BitOr,
    Xor,
    ArrayCat,
    ArrayMul,
    MergeErrorSets,

    // === Comparisons. `PlNode` + `Bin` ===
    CmpEq,
    CmpNeq,
    CmpLt,
    CmpLte,
    CmpGt,
    CmpGte,

    /// Short-circuit `and`. `PlNode` + `BoolBr`, rhs body follows.
    BoolBrAnd,
    /// Short-circuit `or`. `PlNode` + `BoolBr`, rhs body follows.
    BoolBrOr,

    // === Unary. `UnNode` ===
    Negate,
    NegateWrap,
    BoolNot,
    BitNot,

    // === Memory ===
    /// Typed constant allocation. `UnNode` (type)
    Alloc,
    /// Typed mutable allocation. `UnNode` (type)
    AllocMut,
    /// Typed comptime-mutable allocation. `UnNode` (type)
    AllocComptimeMut,
    /// `Node`
    AllocInferred,
    /// `Node`
    AllocInferredMut,
    /// `Node`
    AllocInferredComptimeMut,
    /// Seal an allocation as constant. `UnNode`
    MakePtrConst,
    /// `UnNode`
    ResolveInferredAlloc,
    /// `UnNode`
    Load,
    /// `PlNode` + `Bin` (ptr, value)
    StoreNode,
    /// `PlNode` + `Bin` (ptr, value)
    StoreToInferredPtr,
    /// Take the address of a value. `UnTok`
    Ref,

    // === Access ===
    /// `PlNode` + `Field`
    FieldPtr,
    /// `PlNode` + `Field`
    FieldVal,
    /// `@field` with a computed name. `PlNode` + `FieldNamed`
    FieldPtrNamed,
    /// `PlNode` + `FieldNamed`
    FieldValNamed,
    /// `PlNode` + `Bin` (array ptr, index)
    ElemPtr,
    /// `PlNode` + `Bin` (array, index)
    ElemVal,
    /// Component of a destructure. `ElemValImm`
    ElemValImm,
    /// `PlNode` + `SliceStart`
    SliceStart,
    /// `PlNode` + `SliceEnd`
    SliceEnd,
    /// `PlNode` + `SliceSentinel`
    SliceSentinel,

    // === Optionals and error unions. `UnNode` ===
    IsNonNull,
    IsNonNullPtr,
    IsNonErr,
    IsNonErrPtr,
    OptionalPayloadSafe,
    OptionalPayloadSafePtr,
    /// Payload of an optional already checked non-null.
    OptionalPayloadUnsafe,
    OptionalPayloadUnsafePtr,
    ErrUnionPayloadUnsafe,
    ErrUnionPayloadUnsafePtr,
    ErrUnionCode,
    ErrUnionCodePtr,
    /// `PlNode` + `Try`, error body follows.
    Try,
    /// `PlNode` + `Try`, error body follows.
    TryPtr,

    // === Types ===
    /// `PlNode` + `As`
    AsNode,
    /// Coerce the pointee of a result pointer. `PlNode` + `Bin` (type, ptr)
    CoercePtrElemTy,
    /// Single-operand `@TypeOf`. `UnNode`
    Typeof,
    /// Multi-operand `@TypeOf`. `PlNode` + `TypeofPeer`, body then operands follow.
    TypeofPeer,
    /// Element type of a pointer type. `UnNode`
    ElemType,
    /// `UnNode`
    OptionalType,
    /// `PlNode` + `Bin` (error set, payload)
    ErrorUnionType,
    /// `PlNode` + `Bin` (len, elem)
    ArrayType,
    /// `PlNode` + `ArrayTypeSentinel`
    ArrayTypeSentinel,
    /// `PlNode` + `PtrType` with optional trailing operands.
    PtrType,
    /// `IntType`
    IntType,
    /// `PlNode` + `ErrorSetDecl`, names follow.
    ErrorSetDecl,

    // === Aggregate initialization ===
    /// `UnNode` (type)
    StructInitEmpty,
    /// Field type query on a typed initializer. `PlNode` + `FieldType`
    StructInitFieldType,
    /// `PlNode` + `StructInit`, `StructInitItem`s follow.
    StructInit,
    /// `PlNode` + `StructInitAnon`, `StructInitAnonItem`s follow.
    StructInitAnon,
    /// `PlNode` + `MultiOp`, first operand is the array type.
    ArrayInit,
    /// `PlNode` + `MultiOp`
    ArrayInitAnon,
    /// `PlNode` + `ValidateDestructure`
    ValidateDestructure,

    // === Blocks and control flow ===
    /// `PlNode` + `Block`, body follows.
    Block,
    /// `PlNode` + `Block`, body follows.
    BlockComptime,
    /// `PlNode` + `Block`, body follows.
    BlockInline,
    /// `PlNode` + `Block`, body follows.
    Loop,
    /// `PlNode` + `CondBr`, then and else bodies follow.
    CondBr,
    /// `PlNode` + `CondBr`
    CondBrInline,
    /// `Break` + `BreakPayload`
    Break,
    /// `Break` + `BreakPayload`
    BreakInline,
    /// Re-dispatch a labeled switch with a new operand. `Break` + `BreakPayload`
    SwitchContinue,
    /// `Node`
    Repeat,
    /// `Node`
    RepeatInline,
    /// `PlNode` + `SwitchBlock`, prongs follow.
    SwitchBlock,
    /// Switch on a pointer operand. `PlNode` + `SwitchBlock`
    SwitchBlockRef,
    /// Stand-in for an inline prong capture. `Placeholder`
    ValuePlaceholder,
    /// Shared bound check for all `for` inputs. `PlNode` + `MultiOp`
    ForLen,
    /// `Node`
    Unreachable,
    /// `PlNode` + `Block`, body follows.
    SuspendBlock,

    // === Calls ===
    /// `PlNode` + `Call`, argument bodies follow.
    Call,
    /// `PlNode` + `FieldCall`, argument bodies follow.
    FieldCall,
    /// Generic intrinsic. `PlNode` + `BuiltinCall`, operands follow.
    BuiltinCall,
    /// `PlTok` + `Import`
    Import,
    /// Single-operand `@TypeOf` evaluated in a probe body. `PlNode` + `Block`
    TypeofBuiltin,
    /// `PlNode` + `Block`
    CImport,
    /// `Node`
    This,
    /// `UnNode`
    CompileError,
    /// `Node`
    ErrorReturnTrace,

    // === Statements ===
    /// `DbgStmt`
    DbgStmt,
    /// `StrOp`
    DbgVarVal,
    /// `StrOp`
    DbgVarPtr,
    /// `UnNode`
    EnsureResultUsed,
    /// `UnNode`
    EnsureResultNonError,
    /// `Defer`
    Defer,
    /// `DeferErrCode` + `DeferErrCodePayload`
    DeferErrCode,

    // === Returns ===
    /// `UnNode`
    RetNode,
    /// `UnNode` (result pointer)
    RetLoad,
    /// Fallthrough return at the end of a body. `UnTok`
    RetImplicit,
    /// `return error.Name`. `StrTok`
    RetErrValue,
    /// `Node`
    RetPtr,
    /// `Node`
    RetType,
    /// `SaveErrRetIndex`
    SaveErrRetIndex,
    /// Restore only if `operand` is not an error. `PlNode` + `RestoreErrRetIndex`
    RestoreErrRetIndex,
    /// `UnNode`, operand is the block to pop to or `NONE` for the function.
    RestoreErrRetIndexUnconditional,
    /// Restore to the index saved on function entry. `UnNode`
    RestoreErrRetIndexFnEntry,

    // === Declarations ===
    /// `Declaration` + `DeclarationPayload`, bodies follow.
    Declaration,
    /// `PlNode` + `ContainerDecl`, trailing tables follow.
    StructDecl,
    UnionDecl,
    EnumDecl,
    OpaqueDecl,
    /// `PlNode` + `Func`, bodies follow.
    Func,
    /// `PlTok` + `Param`, type body follows.
    Param,
    ParamComptime,
    /// `StrTok`
    ParamAnytype,
    ParamAnytypeComptime,
    /// Captured value of an enclosing scope. `ClosureGet`
    ClosureGet,
    /// `StrTok`
    DeclRef,
    /// `StrTok`
    DeclVal,
}

impl InstTag {
    /// Control does not continue past this instruction.
    pub const fn is_noreturn(self) -> bool {
        matches!(
            self,
            InstTag::Break
                | InstTag::BreakInline
                | InstTag::SwitchContinue
                | InstTag::CondBr
                | InstTag::CondBrInline
                | InstTag::Repeat
                | InstTag::RepeatInline
                | InstTag::RetNode
                | InstTag::RetLoad
                | InstTag::RetImplicit
                | InstTag::RetErrValue
                | InstTag::Unreachable
                | InstTag::CompileError
        )
    }

    /// The result is always `void`, so it never needs a usage check.
    pub const fn is_always_void(self) -> bool {
        matches!(
            self,
            InstTag::DbgStmt
                | InstTag::DbgVarVal
                | InstTag::DbgVarPtr
                | InstTag::EnsureResultUsed
                | InstTag::EnsureResultNonError
                | InstTag::StoreNode
                | InstTag::StoreToInferredPtr
                | InstTag::ResolveInferredAlloc
                | InstTag::ValidateDestructure
                | InstTag::Defer
                | InstTag::DeferErrCode
                | InstTag::SaveErrRetIndex
                | InstTag::RestoreErrRetIndex
                | InstTag::RestoreErrRetIndexUnconditional
                | InstTag::RestoreErrRetIndexFnEntry
                | InstTag::Declaration
                | InstTag::Param
                | InstTag::ParamComptime
                | InstTag::ParamAnytype
                | InstTag::ParamAnytypeComptime
        )
    }

    /// Instructions whose result is an error union the caller must inspect.
    pub const fn may_be_error(self) -> bool {
        matches!(self, InstTag::Call | InstTag::FieldCall | InstTag::BuiltinCall)
    }

    /// Binary instructions that carry a `Bin` extra record.
    pub const fn is_bin_payload(self) -> bool {
        matches!(
            self,
            InstTag::Add
                | InstTag::AddWrap
                | InstTag::AddSat
                | InstTag::AddUnsafe
                | InstTag::Sub
                | InstTag::SubWrap
                | InstTag::SubSat
                | InstTag::Mul
                | InstTag::MulWrap
                | InstTag::MulSat
                | InstTag::Div
                | InstTag::Mod
                | InstTag::Shl
                | InstTag::ShlSat
                | InstTag::Shr
                | InstTag::BitAnd
                | InstTag::BitOr
                | InstTag::Xor
                | InstTag::ArrayCat
                | InstTag::ArrayMul
                | InstTag::MergeErrorSets
                | InstTag::CmpEq
                | InstTag::CmpNeq
                | InstTag::CmpLt
                | InstTag::CmpLte
                | InstTag::CmpGt
                | InstTag::CmpGte
                | InstTag::StoreNode
                | InstTag::StoreToInferredPtr
                | InstTag::ElemPtr
                | InstTag::ElemVal
                | InstTag::ErrorUnionType
                | InstTag::ArrayType
                | InstTag::CoercePtrElemTy
        )
    }
}
