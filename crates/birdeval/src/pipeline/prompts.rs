pub struct ExtractPrompt<'a> {
    pub question: &'a str,
    pub db_id: &'a str,
    pub schema: &'a str,
}

pub fn extract(args: &ExtractPrompt<'_>) -> String {
    format!(
        "You are given the following question:\n\n\
         {question}\n\n\
         It has to be answered with a query against the {db_id} database, which contains \
         these tables and schemas:\n\n\
         {schema}\n\n\
         List every relevant column together with the table it belongs to. Output nothing \
         except the relevant tables and columns. The question may span several tables and \
         need JOINs.\n",
        question = args.question,
        db_id = args.db_id,
        schema = args.schema,
    )
}

pub struct VerifyPrompt<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub proposal: &'a str,
}

pub fn verify(args: &VerifyPrompt<'_>) -> String {
    format!(
        "A SQL query must be written to answer the following question:\n\n\
         {question}\n\n\
         The query runs against this database:\n\n\
         {schema}\n\n\
         The query may need JOINs, so consider carefully which tables are required; there \
         may be several.\n\n\
         Someone proposed that these are all the tables needed:\n\n\
         {proposal}\n\n\
         Is that enough? Are tables missing that must be joined? Are there too many? Reason \
         about the proposed tables first, then decide whether the list is correct and \
         justify the decision.\n",
        question = args.question,
        schema = args.schema,
        proposal = args.proposal,
    )
}

pub struct MergePrompt<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub proposal: &'a str,
    pub critique: &'a str,
}

pub fn merge(args: &MergePrompt<'_>) -> String {
    format!(
        "Two reviewers discussed which tables and columns answer a question.\n\n\
         The question is:\n\n\
         {question}\n\n\
         It is asked against a database with these tables and schemas:\n\n\
         {schema}\n\n\
         The first reviewer proposed:\n\n\
         {proposal}\n\n\
         The second reviewer replied:\n\n\
         {critique}\n\n\
         Combine both answers into one complete list. State clearly every column and table \
         needed to answer the question.\n",
        question = args.question,
        schema = args.schema,
        proposal = args.proposal,
        critique = args.critique,
    )
}

pub struct GeneratePrompt<'a> {
    pub question: &'a str,
    pub db_id: &'a str,
    pub relevant_columns: &'a str,
    pub hint: &'a str,
}

pub fn generate(args: &GeneratePrompt<'_>) -> String {
    format!(
        "Write a SQLite query that answers this question:\n\n\
         {question}\n\n\
         The query runs against the {db_id} database, whose relevant tables and columns \
         are:\n\n\
         {relevant_columns}\n\n\
         Use this hint:\n\n\
         {hint}\n\n\
         Output only the SQL query. Consider whether tables must be joined.\n",
        question = args.question,
        db_id = args.db_id,
        relevant_columns = args.relevant_columns,
        hint = args.hint,
    )
}

pub struct JudgePrompt<'a> {
    pub question: &'a str,
    pub db_id: &'a str,
    pub sql: &'a str,
    pub answer: &'a str,
}

pub fn judge(args: &JudgePrompt<'_>) -> String {
    format!(
        "Judge whether a SQL query answers its question.\n\n\
         The question is:\n\n\
         {question}\n\n\
         This statement was run against the {db_id} database:\n\n\
         {sql}\n\n\
         and produced this answer:\n\n\
         {answer}\n\n\
         First decide whether the answer is what the question expects. Think step by step \
         and explain why it does or does not match. Pay close attention to which columns \
         are returned, since the question may be specific about them.\n\n\
         Then output the SQL query you consider correct, again paying attention to the \
         selected columns.",
        question = args.question,
        db_id = args.db_id,
        sql = args.sql,
        answer = args.answer,
    )
}

pub struct RevisePrompt<'a> {
    pub question: &'a str,
    pub db_id: &'a str,
    pub sql: &'a str,
    pub answer: &'a str,
    pub critique: &'a str,
}

pub fn revise(args: &RevisePrompt<'_>) -> String {
    format!(
        "Produce the final SQL statement for a question after a review discussion.\n\n\
         The question is:\n\n\
         {question}\n\n\
         This statement was run against the {db_id} database:\n\n\
         {sql}\n\n\
         and produced this answer:\n\n\
         {answer}\n\n\
         A reviewer then criticised the statement:\n\n\
         {critique}\n\n\
         Taking the discussion into account, output the statement that should be run. \
         Output only that query and nothing else.\n",
        question = args.question,
        db_id = args.db_id,
        sql = args.sql,
        answer = args.answer,
        critique = args.critique,
    )
}
