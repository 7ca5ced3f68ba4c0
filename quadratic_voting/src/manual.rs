/*!

This is the long-form manual for `quadratic_voting` and `qvote`.

## Quadratic voting

Each voter gets a budget of credits (9 by default). Putting `n` votes on an
option costs `n²` credits:

| votes | cost |
|-------|------|
| 0     | 0    |
| 1     | 1    |
| 2     | 4    |
| 3     | 9    |

A ballot can leave credits unspent. A ballot that spends more than the budget
cannot be submitted.

## The responses sheet

Ballots are stored one per row in a sheet with a single header row. The first
ballot ever written decides the column order:

| timestamp_utc | email | total_cost | option 1 | ... | option n | Other (text) | Other (votes) |
|---------------|-------|------------|----------|-----|----------|--------------|---------------|

* `timestamp_utc` is the ISO-8601 time of the submission
* `email` is trimmed and lower-cased, it is the identity of the voter
* one column per option of the slate, with the number of votes (0 to 3)
* `Other (text)` and `Other (votes)` hold the option proposed by the voter,
  empty and 0 when none was proposed

Later ballots always follow the existing header.

## Replacing a ballot

An email can only have one ballot. When a voter submits again, the submission
is blocked until they ask to replace their previous ballot. The previous rows
are then deleted and the new ballot appended.

Two sessions submitting for the same email at the same time may both pass the
duplicate check, leaving two rows for that email. The next replace for that
email deletes all of them. Deleting the duplicates periodically is left to
whoever maintains the sheet.

## Command line

```bash
qvote --config form.json --email someone@example.com \
  --vote "Make It Possible=2" --vote "Rise and Realize=1" \
  --propose "My own name" --propose-votes 1
```

`--replace` replaces a previous ballot, `--dry-run` prints the summary
without writing anything. An Excel export of the responses sheet can be
turned into the CSV store with `--import-xlsx responses.xlsx`.

*/
